mod coordinator;
mod driver;
mod phase;
mod summary;
mod ui;

// Public API of the run subsystem.
pub use coordinator::{AnswerDisposition, QuizRun};
pub use driver::{RunCommand, RunDriver, RunHandle};
pub use phase::RunPhase;
pub use summary::{EndReason, RunSummary};
pub use ui::{RunUi, Severity};
