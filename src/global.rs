use crate::job::JobSet;

/// Session state threaded through evaluation.
#[derive(Debug, Default)]
pub struct State {
    pub jobs: JobSet,
}

impl State {
    pub fn new() -> State {
        State::default()
    }
}
