use std::io::{self, BufRead};
use std::path::Path;

use nix::unistd::chdir;

use crate::chat;
use crate::global::State;
use crate::types::Command;
use crate::SYSNAME;

/// What a builtin asks the session loop to do next.
pub enum Outcome {
    Status(i32),
    Exit,
}

type Builtin = fn(&mut State, &Command) -> Outcome;

/// Builtins run in the interpreter process, before any fork.
pub fn lookup(name: &str) -> Option<Builtin> {
    match name {
        "exit" => Some(builtin_exit),
        "cd" => Some(builtin_cd),
        "cut" => Some(builtin_cut),
        "chatroom" => Some(builtin_chatroom),
        _ => None,
    }
}

fn builtin_exit(_: &mut State, _: &Command) -> Outcome {
    Outcome::Exit
}

/// Runs in the parent so the working directory actually changes; a failure
/// is reported verbatim and leaves the session alive.
fn builtin_cd(_: &mut State, command: &Command) -> Outcome {
    let Some(target) = command.arguments.first() else {
        eprintln!("{}: cd: missing operand", SYSNAME);
        return Outcome::Status(1);
    };
    match chdir(Path::new(target)) {
        Ok(()) => Outcome::Status(0),
        Err(e) => {
            eprintln!("{}: cd: {}: {}", SYSNAME, target, e);
            Outcome::Status(1)
        }
    }
}

/// Field extraction over standard input: `-d <delim>` (first character,
/// default tab), `-f <list>` (comma-separated 1-based field numbers).
/// Handled in-process so it can consume the read end of a pipeline.
fn builtin_cut(_: &mut State, command: &Command) -> Outcome {
    let mut delim = '\t';
    let mut field_list: Option<&str> = None;
    let args = &command.arguments;
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "-d" => {
                if let Some(value) = args.get(i + 1) {
                    delim = value.chars().next().unwrap_or('\t');
                    i += 1;
                }
            }
            "-f" => {
                if let Some(value) = args.get(i + 1) {
                    field_list = Some(value);
                    i += 1;
                }
            }
            _ => {}
        }
        i += 1;
    }
    let Some(field_list) = field_list else {
        return Outcome::Status(0);
    };
    let fields: Vec<usize> = field_list
        .split(',')
        .filter_map(|f| f.trim().parse().ok())
        .filter(|&f| f > 0)
        .collect();
    if fields.is_empty() {
        return Outcome::Status(0);
    }
    for line in io::stdin().lock().lines() {
        match line {
            Ok(line) => println!("{}", extract_fields(&line, delim, &fields)),
            Err(_) => break,
        }
    }
    Outcome::Status(0)
}

fn extract_fields(line: &str, delim: char, fields: &[usize]) -> String {
    let parts: Vec<&str> = line.split(delim).collect();
    let selected: Vec<&str> = fields
        .iter()
        .filter_map(|&f| parts.get(f - 1).copied())
        .collect();
    selected.join(&delim.to_string())
}

fn builtin_chatroom(_: &mut State, command: &Command) -> Outcome {
    let (Some(room), Some(user)) = (command.arguments.first(), command.arguments.get(1)) else {
        eprintln!("usage: chatroom <room> <user>");
        return Outcome::Status(1);
    };
    match chat::run(room, user) {
        Ok(()) => Outcome::Status(0),
        Err(e) => {
            eprintln!("{}: chatroom: {}", SYSNAME, e);
            Outcome::Status(1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtins_are_recognized_by_name() {
        for name in ["exit", "cd", "cut", "chatroom"] {
            assert!(lookup(name).is_some());
        }
        assert!(lookup("ls").is_none());
        assert!(lookup("").is_none());
    }

    #[test]
    fn extracts_selected_fields_in_requested_order() {
        assert_eq!(extract_fields("a\tb\tc", '\t', &[1, 3]), "a\tc");
        assert_eq!(extract_fields("a:b:c", ':', &[2]), "b");
        assert_eq!(extract_fields("a:b:c", ':', &[3, 1]), "c:a");
    }

    #[test]
    fn out_of_range_fields_are_dropped() {
        assert_eq!(extract_fields("a:b", ':', &[1, 5]), "a");
        assert_eq!(extract_fields("", ':', &[2]), "");
    }
}
