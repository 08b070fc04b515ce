use std::env;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use nix::unistd::{access, AccessFlags};

/// Map a command name to an executable path.
///
/// A name containing a path separator is taken literally; anything else is
/// searched through the directories of `PATH` in listed order. No caching:
/// every lookup sees the current `PATH` and filesystem.
pub fn resolve(name: &str) -> Option<PathBuf> {
    resolve_with(name, env::var_os("PATH").as_deref())
}

fn resolve_with(name: &str, path_list: Option<&OsStr>) -> Option<PathBuf> {
    if name.is_empty() {
        return None;
    }
    if name.contains('/') {
        let path = Path::new(name);
        return if executable(path) {
            Some(path.to_path_buf())
        } else {
            None
        };
    }
    env::split_paths(path_list?)
        .map(|dir| dir.join(name))
        .find(|candidate| executable(candidate))
}

fn executable(path: &Path) -> bool {
    access(path, AccessFlags::X_OK).is_ok()
}
