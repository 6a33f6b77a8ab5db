mod ids;
mod mode;
mod question;
mod session;

pub use ids::{AttemptId, OpaqueId, OptionId, QuestionId};
pub use mode::{Mode, ModeError};
pub use question::{AnswerOption, AnswerSubmission, LastOutcome, Outcome, Question};
pub use session::{
    DEFAULT_DIFFICULTY, SeenSet, SessionState, SessionStateError, StateFragment, StateSnapshot,
};
