use std::fmt;

use quiz_core::model::{AttemptId, Mode};

/// Why a run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    /// Wrong answer in a mode that eliminates on the first miss.
    WrongAnswer,
    /// The run-wide deadline passed.
    TimeUp,
    /// The server reported there are no more questions.
    Exhausted,
    /// The player ended the run.
    UserEnded,
    /// A fetch or submission failed and the run was abandoned.
    Failed,
}

impl fmt::Display for EndReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            EndReason::WrongAnswer => "wrong answer",
            EndReason::TimeUp => "time up",
            EndReason::Exhausted => "no questions left",
            EndReason::UserEnded => "ended by player",
            EndReason::Failed => "remote failure",
        };
        f.write_str(text)
    }
}

/// Final tally of a finished run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub attempt_id: Option<AttemptId>,
    pub mode: Mode,
    pub score: i64,
    pub answered: u32,
    pub reason: EndReason,
    /// `end_attempt` was acknowledged by the server.
    pub closed: bool,
}
