use async_trait::async_trait;

use quiz_core::model::{AttemptId, Question};

use crate::timer::TimerReadout;

/// Tone of a transient notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Success,
    Error,
}

/// Presentation collaborator driven by the coordinator.
///
/// Every hook is called from the coordinator's task; implementations should
/// return quickly and never call back into the run.
#[async_trait]
pub trait RunUi: Send + Sync {
    fn show_question(&self, question: &Question);

    fn notify(&self, text: &str, severity: Severity);

    /// Prompt for a run length in seconds. `None` means the prompt was
    /// dismissed or the input did not parse.
    async fn ask_duration(&self) -> Option<i64>;

    fn go_to_results(&self, attempt_id: &AttemptId);

    /// Collapse surrounding chrome for the run.
    fn enter_immersive(&self);

    /// Restore whatever `enter_immersive` collapsed.
    fn exit_immersive(&self);

    fn show_score(&self, _score: i64) {}

    fn show_timer(&self, _readout: &TimerReadout) {}
}
