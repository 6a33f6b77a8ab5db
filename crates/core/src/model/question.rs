use crate::model::ids::{AttemptId, OptionId, QuestionId};
use crate::model::mode::Mode;
use crate::model::session::StateSnapshot;

//
// ─── QUESTION ──────────────────────────────────────────────────────────────────
//

/// One selectable answer as served by the authority.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerOption {
    pub id: OptionId,
    pub text: String,
}

/// A question as rendered to the player.
///
/// Replaced wholesale on every fetch and never mutated after render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    pub id: QuestionId,
    pub prompt: String,
    pub difficulty: Option<i32>,
    pub options: Vec<AnswerOption>,
    pub qtype: Option<String>,
}

impl Question {
    #[must_use]
    pub fn has_option(&self, id: &OptionId) -> bool {
        self.options.iter().any(|o| &o.id == id)
    }

    /// Difficulty label used by renderers.
    #[must_use]
    pub fn difficulty_label(&self) -> String {
        match self.difficulty {
            Some(level) => format!("Level {level}"),
            None => "XP Unknown".to_owned(),
        }
    }
}

//
// ─── OUTCOMES ──────────────────────────────────────────────────────────────────
//

/// Summary of the previous question, sent with the next fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LastOutcome {
    pub correct: bool,
    pub question_id: QuestionId,
    pub difficulty: Option<i32>,
}

/// Verdict for one submitted answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub correct: bool,
    /// New authoritative score for the whole attempt, when the server sent one.
    pub attempt_score: Option<i64>,
    pub correct_answers: Vec<String>,
    pub next_difficulty: Option<i32>,
}

impl Outcome {
    /// Notification text shown after the verdict.
    #[must_use]
    pub fn verdict_text(&self) -> String {
        if self.correct {
            "Correct!".to_owned()
        } else {
            format!("Wrong! Correct: {}", self.correct_answers.join(", "))
        }
    }
}

/// Answer payload, built fresh for every question.
///
/// `selected` is empty for a timeout or forced skip. `time_used` is `None`
/// when the question start was never recorded.
#[derive(Debug, Clone, PartialEq)]
pub struct AnswerSubmission {
    pub attempt_id: AttemptId,
    pub question_id: QuestionId,
    pub selected: Vec<OptionId>,
    pub mode: Mode,
    pub time_used: Option<f64>,
    pub state: StateSnapshot,
}

impl AnswerSubmission {
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        self.selected.is_empty()
    }
}
