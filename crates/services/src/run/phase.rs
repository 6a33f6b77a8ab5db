use std::fmt;

/// Where a run is in its lifecycle.
///
/// `Idle` is only ever left once; after a successful start the run moves
/// forward through fetch/answer cycles until `Finished`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunPhase {
    #[default]
    Idle,
    Starting,
    FetchingQuestion,
    Answering,
    Submitting,
    Finishing,
    Finished,
}

impl RunPhase {
    /// An attempt is live and owns timers.
    #[must_use]
    pub fn is_active(self) -> bool {
        matches!(
            self,
            RunPhase::FetchingQuestion | RunPhase::Answering | RunPhase::Submitting
        )
    }

    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, RunPhase::Finishing | RunPhase::Finished)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            RunPhase::Idle => "idle",
            RunPhase::Starting => "starting",
            RunPhase::FetchingQuestion => "fetching_question",
            RunPhase::Answering => "answering",
            RunPhase::Submitting => "submitting",
            RunPhase::Finishing => "finishing",
            RunPhase::Finished => "finished",
        }
    }
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
