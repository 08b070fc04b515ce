use std::fs::{self, OpenOptions};
use std::io::{self, BufRead, BufReader, ErrorKind, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};

use nix::sys::signal::{kill, Signal};
use nix::sys::stat::{mkfifo, Mode};
use nix::sys::wait::waitpid;
use nix::unistd::{fork, ForkResult, Pid};

use crate::error::ShellError;
use crate::job::JobSet;

/// A room is a directory under /tmp; each participant is one named pipe in
/// it, named after the participant. Membership is pipe existence.
pub fn room_path(room: &str) -> PathBuf {
    PathBuf::from(format!("/tmp/chatroom-{}", room))
}

/// Join a room and run the session: a forked reader copies the own pipe to
/// stdout while the foreground loop broadcasts typed lines to every other
/// participant. `exit` or end of input leaves the room.
pub fn run(room: &str, user: &str) -> Result<(), ShellError> {
    let room_dir = room_path(room);
    ensure_room(&room_dir)?;
    let own_pipe = room_dir.join(user);
    ensure_fifo(&own_pipe)?;
    log::debug!("joined {} as {}", room_dir.display(), user);
    println!("Welcome to {}!", room);

    let reader = spawn_reader(&own_pipe)?;
    let mut helpers = JobSet::new();
    let stdin = io::stdin();
    loop {
        print!("[{}] {} > ", room, user);
        io::stdout().flush()?;
        let mut input = String::new();
        if stdin.read_line(&mut input)? == 0 {
            break; // end of input
        }
        let input = input.trim_end_matches('\n');
        if input == "exit" {
            break;
        }
        let message = format!("[{}] {}: {}\n", room, user, input);
        broadcast(&room_dir, user, &message, &mut helpers)?;
        helpers.sweep();
    }

    // The reader blocks in its pipe forever; terminate and collect it, then
    // drain any stragglers from the last broadcast.
    let _ = kill(reader, Signal::SIGTERM);
    let _ = waitpid(reader, None);
    helpers.wait_all();
    let _ = fs::remove_file(&own_pipe);
    // The room directory itself is left behind for returning participants.
    Ok(())
}

fn ensure_room(dir: &Path) -> Result<(), ShellError> {
    match fs::create_dir(dir) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(()),
        Err(e) => Err(e.into()),
    }
}

fn ensure_fifo(path: &Path) -> Result<(), ShellError> {
    match mkfifo(path, Mode::from_bits_truncate(0o666)) {
        Ok(()) => Ok(()),
        Err(nix::errno::Errno::EEXIST) => Ok(()),
        Err(e) => Err(e.into()),
    }
}

fn spawn_reader(pipe: &Path) -> Result<Pid, ShellError> {
    match unsafe { fork() }? {
        ForkResult::Parent { child } => Ok(child),
        ForkResult::Child => read_loop(pipe),
    }
}

fn read_loop(pipe: &Path) -> ! {
    // Read-write keeps the pipe open across writer turnover, so the loop
    // never sees EOF while the room is quiet.
    let file = match OpenOptions::new().read(true).write(true).open(pipe) {
        Ok(file) => file,
        Err(_) => unsafe { libc::_exit(1) },
    };
    let reader = BufReader::new(file);
    let mut stdout = io::stdout();
    for line in reader.lines() {
        match line {
            Ok(line) => {
                let _ = writeln!(stdout, "{}", line);
                let _ = stdout.flush();
            }
            Err(_) => break,
        }
    }
    unsafe { libc::_exit(0) }
}

/// Fan the message out: one throwaway child per currently listed participant
/// other than the sender. Each child opens the recipient's pipe non-blocking;
/// no reader attached means a silent delivery miss.
fn broadcast(
    room_dir: &Path,
    user: &str,
    message: &str,
    helpers: &mut JobSet,
) -> Result<(), ShellError> {
    let entries = match fs::read_dir(room_dir) {
        Ok(entries) => entries,
        Err(_) => return Ok(()),
    };
    for entry in entries.flatten() {
        if entry.file_name() == user {
            continue; // never to the sender's own pipe
        }
        let target = entry.path();
        match unsafe { fork() }? {
            ForkResult::Parent { child } => helpers.push(child),
            ForkResult::Child => deliver(&target, message),
        }
    }
    Ok(())
}

fn deliver(target: &Path, message: &str) -> ! {
    let mut file = match OpenOptions::new()
        .write(true)
        .custom_flags(libc::O_NONBLOCK)
        .open(target)
    {
        Ok(file) => file,
        Err(_) => unsafe { libc::_exit(0) }, // nobody reading; drop the message
    };
    let _ = file.write_all(message.as_bytes());
    unsafe { libc::_exit(0) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::FORK_LOCK;
    use std::io::Read;
    use std::os::unix::fs::FileTypeExt;

    fn nonblocking_handle(path: &Path) -> fs::File {
        OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_NONBLOCK)
            .open(path)
            .unwrap()
    }

    #[test]
    fn join_materializes_directory_and_fifo() {
        let room = format!("test-join-{}", std::process::id());
        let dir = room_path(&room);
        ensure_room(&dir).unwrap();
        ensure_room(&dir).unwrap(); // pre-existing room is fine
        let pipe = dir.join("alice");
        ensure_fifo(&pipe).unwrap();
        ensure_fifo(&pipe).unwrap(); // rejoin keeps the existing pipe
        assert!(fs::metadata(&pipe).unwrap().file_type().is_fifo());
        fs::remove_file(&pipe).unwrap();
        fs::remove_dir(&dir).unwrap();
    }

    #[test]
    fn broadcast_reaches_others_and_skips_the_sender() {
        let _guard = FORK_LOCK.lock().unwrap();
        let room = format!("test-cast-{}", std::process::id());
        let dir = room_path(&room);
        ensure_room(&dir).unwrap();
        let alice = dir.join("alice");
        let bob = dir.join("bob");
        ensure_fifo(&alice).unwrap();
        ensure_fifo(&bob).unwrap();

        // Keep both pipes attached so delivery cannot silently miss.
        let mut alice_end = nonblocking_handle(&alice);
        let mut bob_end = nonblocking_handle(&bob);

        let mut helpers = JobSet::new();
        broadcast(&dir, "alice", "[r] alice: hi\n", &mut helpers).unwrap();
        helpers.wait_all(); // all writes are complete once the helpers exit

        let mut buf = [0u8; 128];
        let n = bob_end.read(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"[r] alice: hi\n");
        let own = alice_end.read(&mut buf);
        assert_eq!(own.unwrap_err().kind(), ErrorKind::WouldBlock);

        // A departed participant is simply no longer listed.
        fs::remove_file(&bob).unwrap();
        broadcast(&dir, "alice", "[r] alice: again\n", &mut helpers).unwrap();
        helpers.wait_all();
        let own = alice_end.read(&mut buf);
        assert_eq!(own.unwrap_err().kind(), ErrorKind::WouldBlock);

        fs::remove_file(&alice).unwrap();
        fs::remove_dir(&dir).unwrap();
    }
}
