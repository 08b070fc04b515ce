use std::ffi::CString;
use std::fs::OpenOptions;
use std::os::fd::{AsRawFd, IntoRawFd, OwnedFd, RawFd};
use std::os::unix::ffi::OsStringExt;

use nix::unistd::{self, ForkResult, Pid};

use crate::builtin;
use crate::error::ShellError;
use crate::global::State;
use crate::job;
use crate::search;
use crate::types::Command;
use crate::SYSNAME;

/// What one evaluated line asks the session loop to do.
pub enum Eval {
    Status(i32),
    Exit,
}

/// Evaluate one parsed chain. Builtins intercept on the chain head before
/// any fork; everything else becomes a tree of processes. No child failure
/// reaches the caller: errors degrade to a reported status.
pub fn eval(state: &mut State, command: &Command) -> Eval {
    if command.name.is_empty() {
        return Eval::Status(0);
    }
    if let Some(func) = builtin::lookup(&command.name) {
        return match func(state, command) {
            builtin::Outcome::Status(status) => Eval::Status(status),
            builtin::Outcome::Exit => Eval::Exit,
        };
    }
    match run_pipeline(state, command) {
        Ok(status) => Eval::Status(status),
        Err(e) => {
            // Parent-level failure (pipe or fork); the cycle is abandoned.
            eprintln!("{}: {}", SYSNAME, e);
            Eval::Status(1)
        }
    }
}

fn run_pipeline(state: &mut State, command: &Command) -> Result<i32, ShellError> {
    let background = command.tail().background;
    match &command.next {
        None => match unsafe { unistd::fork() }? {
            ForkResult::Child => exec_stage(command),
            ForkResult::Parent { child } => Ok(finish(state, &[child], background)),
        },
        Some(next) => {
            let (read_end, write_end) = unistd::pipe()?;
            let left = match unsafe { unistd::fork() }? {
                ForkResult::Child => child_left(command, read_end, write_end),
                ForkResult::Parent { child } => child,
            };
            let right = match unsafe { unistd::fork() }? {
                ForkResult::Child => child_right(state, next, read_end, write_end),
                ForkResult::Parent { child } => child,
            };
            // Both ends are wired into the children; the parent must not
            // hold the write end open or the right stage never sees EOF.
            drop(read_end);
            drop(write_end);
            Ok(finish(state, &[left, right], background))
        }
    }
}

/// Left stage of a pipe: stdout becomes the write end, then the ordinary
/// single-stage path runs for the head command only.
fn child_left(command: &Command, read_end: OwnedFd, write_end: OwnedFd) -> ! {
    if let Err(e) = unistd::dup2(write_end.as_raw_fd(), libc::STDOUT_FILENO) {
        eprintln!("{}: {}", SYSNAME, e);
        unsafe { libc::_exit(1) }
    }
    drop(read_end);
    drop(write_end);
    exec_stage(command)
}

/// Right side of a pipe: stdin becomes the read end, then the remainder of
/// the chain is evaluated whole, builtin interception included, so arbitrary
/// pipeline lengths are handled by right-recursion.
fn child_right(state: &mut State, rest: &Command, read_end: OwnedFd, write_end: OwnedFd) -> ! {
    if let Err(e) = unistd::dup2(read_end.as_raw_fd(), libc::STDIN_FILENO) {
        eprintln!("{}: {}", SYSNAME, e);
        unsafe { libc::_exit(1) }
    }
    drop(read_end);
    drop(write_end);
    let status = match eval(state, rest) {
        Eval::Status(status) => status,
        Eval::Exit => 0,
    };
    unsafe { libc::_exit(status) }
}

/// Wait policy for freshly forked stages. Background pipelines are handed to
/// the reaper after one non-blocking attempt; foreground blocks on every
/// stage and reports the rightmost status.
fn finish(state: &mut State, pids: &[Pid], background: bool) -> i32 {
    if background {
        for &pid in pids {
            state.jobs.push(pid);
        }
        state.jobs.sweep();
        return 0;
    }
    let mut status = 0;
    for &pid in pids {
        status = job::wait_status(pid);
    }
    status
}

/// Terminal path of every forked stage: resolve, redirect, exec. Never
/// returns; on any failure the child reports and exits without unwinding
/// into the interpreter loop.
fn exec_stage(command: &Command) -> ! {
    unsafe { libc::_exit(run_stage(command)) }
}

fn run_stage(command: &Command) -> i32 {
    let path = match search::resolve(&command.name) {
        Some(path) => path,
        None => {
            eprintln!("{}: {}: command not found", SYSNAME, command.name);
            return 127;
        }
    };

    // Fixed order: input, truncating output, appending output. When both
    // output slots are populated the append target wins, being applied last.
    if let Some(target) = &command.redirect_input {
        if let Err(e) = redirect(OpenOptions::new().read(true), target, libc::STDIN_FILENO) {
            eprintln!("{}: {}: {}", SYSNAME, target, e);
            return 1;
        }
    }
    if let Some(target) = &command.redirect_output_truncate {
        let mut opts = OpenOptions::new();
        opts.write(true).create(true).truncate(true);
        if let Err(e) = redirect(&mut opts, target, libc::STDOUT_FILENO) {
            eprintln!("{}: {}: {}", SYSNAME, target, e);
            return 1;
        }
    }
    if let Some(target) = &command.redirect_output_append {
        let mut opts = OpenOptions::new();
        opts.append(true).create(true);
        if let Err(e) = redirect(&mut opts, target, libc::STDOUT_FILENO) {
            eprintln!("{}: {}: {}", SYSNAME, target, e);
            return 1;
        }
    }

    let argv = match command.argv() {
        Ok(argv) => argv,
        Err(e) => {
            eprintln!("{}: {}: {}", SYSNAME, command.name, e);
            return 1;
        }
    };
    let path = match CString::new(path.into_os_string().into_vec()) {
        Ok(path) => path,
        Err(e) => {
            eprintln!("{}: {}: {}", SYSNAME, command.name, e);
            return 1;
        }
    };
    let err = match unistd::execv(&path, &argv) {
        Err(e) => e,
        Ok(infallible) => match infallible {},
    };
    eprintln!("{}: {}: {}", SYSNAME, command.name, err);
    127
}

/// Replace a standard stream with a freshly opened file.
fn redirect(opts: &mut OpenOptions, target: &str, stream: RawFd) -> Result<(), ShellError> {
    let file = opts.open(target)?;
    let fd = file.into_raw_fd();
    unistd::dup2(fd, stream)?;
    unistd::close(fd)?;
    Ok(())
}
