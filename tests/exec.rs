use std::fs;
use std::thread::sleep;
use std::time::Duration;

use shellish::eval::{eval, Eval};
use shellish::global::State;
use shellish::parser::parse;

fn status_of(state: &mut State, line: &str) -> i32 {
    match eval(state, &parse(line)) {
        Eval::Status(status) => status,
        Eval::Exit => panic!("unexpected session exit for {:?}", line),
    }
}

// Everything that forks runs sequentially inside one test: concurrent tests
// in this process could otherwise reap each other's children.
#[test]
fn pipelines_redirections_and_reaping_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let path = |name: &str| dir.path().join(name).display().to_string();
    let mut state = State::new();

    // Plain exit statuses, foreground.
    assert_eq!(status_of(&mut state, "true"), 0);
    assert_eq!(status_of(&mut state, "false"), 1);
    assert_eq!(status_of(&mut state, "definitely-not-a-command-xyz"), 127);
    assert_eq!(status_of(&mut state, ""), 0);

    // Output redirection, truncating then appending.
    let out = path("out.txt");
    assert_eq!(status_of(&mut state, &format!("echo one > {}", out)), 0);
    assert_eq!(fs::read_to_string(&out).unwrap(), "one\n");
    assert_eq!(status_of(&mut state, &format!("echo two >> {}", out)), 0);
    assert_eq!(fs::read_to_string(&out).unwrap(), "one\ntwo\n");
    assert_eq!(status_of(&mut state, &format!("echo three > {}", out)), 0);
    assert_eq!(fs::read_to_string(&out).unwrap(), "three\n");

    // Quoted arguments survive the exec boundary with blanks intact.
    let quoted = path("quoted.txt");
    assert_eq!(
        status_of(&mut state, &format!("echo \"a b\" > {}", quoted)),
        0
    );
    assert_eq!(fs::read_to_string(&quoted).unwrap(), "a b\n");

    // Input redirection.
    let src = path("src.txt");
    let copy = path("copy.txt");
    fs::write(&src, "payload\n").unwrap();
    assert_eq!(
        status_of(&mut state, &format!("cat < {} > {}", src, copy)),
        0
    );
    assert_eq!(fs::read_to_string(&copy).unwrap(), "payload\n");

    // A redirection target that cannot be opened fails only the child.
    assert_eq!(
        status_of(&mut state, &format!("cat < {} > {}", path("absent"), copy)),
        1
    );

    // Pipelines, including right-recursion past two stages; the reported
    // status is the rightmost stage's.
    let piped = path("piped.txt");
    assert_eq!(
        status_of(&mut state, &format!("echo hello | cat > {}", piped)),
        0
    );
    assert_eq!(fs::read_to_string(&piped).unwrap(), "hello\n");
    assert_eq!(
        status_of(&mut state, &format!("echo deep | cat | cat > {}", piped)),
        0
    );
    assert_eq!(fs::read_to_string(&piped).unwrap(), "deep\n");
    assert_eq!(status_of(&mut state, "true | false"), 1);
    assert_eq!(status_of(&mut state, "false | true"), 0);

    // Background commands return immediately and are reaped by the sweep;
    // a bounded sequence leaves no unreaped children behind.
    assert_eq!(status_of(&mut state, "sleep 0.2 &"), 0);
    assert_eq!(status_of(&mut state, &format!("echo bg > {} &", path("bg"))), 0);
    let mut waited = Duration::ZERO;
    while !state.jobs.is_empty() && waited < Duration::from_secs(5) {
        state.jobs.sweep();
        sleep(Duration::from_millis(20));
        waited += Duration::from_millis(20);
    }
    assert!(state.jobs.is_empty());
    assert_eq!(fs::read_to_string(path("bg")).unwrap(), "bg\n");
}

#[test]
fn builtins_do_not_fork_or_resolve() {
    let mut state = State::new();
    // cd runs in this process; a failure reports without ending the session.
    let before = std::env::current_dir().unwrap();
    assert_eq!(status_of(&mut state, "cd /definitely/not/here"), 1);
    assert_eq!(std::env::current_dir().unwrap(), before);
    // exit asks the loop to stop instead of producing a status.
    assert!(matches!(eval(&mut state, &parse("exit")), Eval::Exit));
}
