use std::ffi::{CString, NulError};

/// One pipeline stage. Stages form a singly linked, owned chain; dropping
/// the head releases the whole pipeline.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Command {
    pub name: String,
    /// User arguments only. argv[0] and the terminating sentinel are an exec
    /// boundary concern, see [`Command::argv`].
    pub arguments: Vec<String>,
    pub redirect_input: Option<String>,
    pub redirect_output_truncate: Option<String>,
    pub redirect_output_append: Option<String>,
    /// Only the terminal stage's flag is consulted for wait behavior.
    pub background: bool,
    /// The line ended in `?`. Informational, consumed by the line editor.
    pub needs_completion: bool,
    pub next: Option<Box<Command>>,
}

impl Command {
    pub fn tail(&self) -> &Command {
        let mut command = self;
        while let Some(next) = &command.next {
            command = next;
        }
        command
    }

    pub fn tail_mut(&mut self) -> &mut Command {
        match self.next {
            Some(ref mut next) => next.tail_mut(),
            None => self,
        }
    }

    /// Number of stages in the chain.
    pub fn stages(&self) -> usize {
        let mut n = 1;
        let mut command = self;
        while let Some(next) = &command.next {
            n += 1;
            command = next;
        }
        n
    }

    /// The argv handed to exec: `name` prepended, per convention. The NUL
    /// terminator is appended by the exec wrapper itself.
    pub fn argv(&self) -> Result<Vec<CString>, NulError> {
        std::iter::once(self.name.as_str())
            .chain(self.arguments.iter().map(String::as_str))
            .map(CString::new)
            .collect()
    }
}
