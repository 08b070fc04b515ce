//! An interactive command interpreter: pipelines of forked processes wired
//! together with pipes and fd redirection, plus a FIFO-backed chatroom.

pub mod builtin;
pub mod chat;
pub mod error;
pub mod eval;
pub mod global;
pub mod job;
pub mod parser;
pub mod search;
pub mod types;

pub use types::Command;

pub const SYSNAME: &str = "shellish";
