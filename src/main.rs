use std::env;

use nix::unistd::gethostname;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use shellish::eval::{self, Eval};
use shellish::global::State;
use shellish::parser;
use shellish::SYSNAME;

fn prompt() -> String {
    let user = env::var("USER").unwrap_or_else(|_| String::from("?"));
    let host = gethostname()
        .map(|h| h.to_string_lossy().into_owned())
        .unwrap_or_else(|_| String::from("?"));
    let cwd = env::current_dir()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|_| String::from("?"));
    format!("{}@{}:{} {}$ ", user, host, cwd, SYSNAME)
}

fn main() {
    env_logger::init();
    let mut state = State::new();
    let mut editor = match DefaultEditor::new() {
        Ok(editor) => editor,
        Err(e) => {
            eprintln!("{}: {}", SYSNAME, e);
            return;
        }
    };

    loop {
        state.jobs.sweep();
        match editor.readline(&prompt()) {
            Ok(line) => {
                if !line.trim().is_empty() {
                    let _ = editor.add_history_entry(line.as_str());
                }
                let command = parser::parse(&line);
                log::debug!("parsed: {:?}", command);
                if command.needs_completion {
                    log::debug!("completion requested for {:?}", command.name);
                }
                match eval::eval(&mut state, &command) {
                    Eval::Status(status) => {
                        if status != 0 {
                            log::debug!("exit status {}", status);
                        }
                    }
                    Eval::Exit => break,
                }
            }
            Err(ReadlineError::Interrupted) => continue,
            Err(ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("{}: {}", SYSNAME, e);
                break;
            }
        }
    }
    state.jobs.sweep();
    // The session itself always leaves with status 0.
}
