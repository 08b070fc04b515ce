use std::ffi::NulError;
use std::io;

use thiserror::Error;

/// Failures crossing the syscall and I/O boundary. Transparent so the user
/// sees the underlying system error text.
#[derive(Debug, Error)]
pub enum ShellError {
    #[error(transparent)]
    Nix(#[from] nix::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Nul(#[from] NulError),
}
