use nix::errno::Errno;
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::Pid;

/// Collector for forked children that are not waited on synchronously:
/// background pipeline stages and chat broadcast helpers. Every registered
/// pid is eventually reaped here, either by a non-blocking sweep between
/// cycles or by the final blocking drain.
#[derive(Debug, Default)]
pub struct JobSet {
    pids: Vec<Pid>,
}

impl JobSet {
    pub fn new() -> JobSet {
        JobSet::default()
    }

    pub fn push(&mut self, pid: Pid) {
        self.pids.push(pid);
    }

    pub fn len(&self) -> usize {
        self.pids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pids.is_empty()
    }

    /// Reap any already-finished children without blocking. Exit statuses of
    /// background work are discarded. Returns the number of children reaped.
    pub fn sweep(&mut self) -> usize {
        let mut reaped = 0;
        loop {
            match waitpid(None, Some(WaitPidFlag::WNOHANG)) {
                Ok(WaitStatus::Exited(pid, _)) | Ok(WaitStatus::Signaled(pid, _, _)) => {
                    log::debug!("reaped background pid {}", pid);
                    self.pids.retain(|&p| p != pid);
                    reaped += 1;
                }
                Ok(_) => break, // children remain, none finished
                Err(Errno::ECHILD) => {
                    self.pids.clear();
                    break;
                }
                Err(_) => break,
            }
        }
        reaped
    }

    /// Blocking drain of everything still registered.
    pub fn wait_all(&mut self) {
        for pid in self.pids.drain(..) {
            let _ = waitpid(pid, None);
        }
    }
}

/// Block until `pid` exits and translate its wait status into a shell exit
/// status (128+signal for signal deaths).
pub fn wait_status(pid: Pid) -> i32 {
    match waitpid(pid, None) {
        Ok(WaitStatus::Exited(_, code)) => code,
        Ok(WaitStatus::Signaled(_, signal, _)) => 128 + signal as i32,
        Ok(_) => 0,
        Err(_) => 0,
    }
}
