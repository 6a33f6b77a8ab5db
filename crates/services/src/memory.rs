//! In-process scoring authority for offline play and tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{Map, Value};

use quiz_core::model::{
    AnswerOption, AnswerSubmission, AttemptId, LastOutcome, Mode, OpaqueId, OptionId, Outcome,
    Question, QuestionId, StateFragment, StateSnapshot,
};

use crate::client::QuizBackend;
use crate::error::RemoteError;
use crate::protocol::{EndReply, QuestionReply};

const MIN_DIFFICULTY: i32 = 1;
const MAX_DIFFICULTY: i32 = 10;
const EXHAUSTED_MESSAGE: &str = "No unseen questions left.";

/// One question of the local bank. Options are numbered from 1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BankQuestion {
    pub id: QuestionId,
    pub prompt: String,
    pub difficulty: i32,
    pub options: Vec<String>,
    /// 1-based positions of the correct options.
    pub correct: Vec<i64>,
}

impl BankQuestion {
    #[must_use]
    pub fn new(id: i64, prompt: impl Into<String>, difficulty: i32) -> Self {
        Self {
            id: QuestionId::new(id),
            prompt: prompt.into(),
            difficulty,
            options: Vec::new(),
            correct: Vec::new(),
        }
    }

    #[must_use]
    pub fn option(mut self, text: impl Into<String>) -> Self {
        self.options.push(text.into());
        self
    }

    #[must_use]
    pub fn correct_option(mut self, text: impl Into<String>) -> Self {
        self.options.push(text.into());
        self.correct.push(self.options.len() as i64);
        self
    }

    fn to_question(&self) -> Question {
        let qtype = if self.correct.len() > 1 { "multi" } else { "single" };
        Question {
            id: self.id,
            prompt: self.prompt.clone(),
            difficulty: Some(self.difficulty),
            options: self
                .options
                .iter()
                .zip(1_i64..)
                .map(|(text, id)| AnswerOption {
                    id: OptionId::from_int(id),
                    text: text.clone(),
                })
                .collect(),
            qtype: Some(qtype.to_owned()),
        }
    }

    fn is_correct(&self, selected: &[OptionId]) -> bool {
        let mut picked: Vec<i64> = selected
            .iter()
            .filter_map(|id| match id.as_opaque() {
                OpaqueId::Int(v) => Some(*v),
                OpaqueId::Text(v) => v.trim().parse().ok(),
            })
            .collect();
        picked.sort_unstable();
        picked.dedup();
        let mut expected = self.correct.clone();
        expected.sort_unstable();
        !expected.is_empty() && picked == expected
    }

    fn correct_texts(&self) -> Vec<String> {
        self.correct
            .iter()
            .filter_map(|pos| usize::try_from(*pos - 1).ok())
            .filter_map(|idx| self.options.get(idx).cloned())
            .collect()
    }
}

/// A call received by `InMemoryBackend`, in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendCall {
    Start {
        mode: Mode,
        params: Map<String, Value>,
    },
    GetQuestion {
        mode: Mode,
        attempt_id: AttemptId,
        last_outcome: Option<LastOutcome>,
        state: StateSnapshot,
    },
    Submit(AnswerSubmission),
    End {
        attempt_id: AttemptId,
    },
}

#[derive(Debug, Default)]
struct AttemptRecord {
    score: i64,
    seen: Vec<QuestionId>,
    ended: bool,
}

#[derive(Debug, Default)]
struct Ledger {
    next_attempt: i64,
    attempts: HashMap<AttemptId, AttemptRecord>,
    calls: Vec<BackendCall>,
}

/// `QuizBackend` over a fixed question bank held in memory.
///
/// Picks the unseen question nearest the reported difficulty, moves
/// difficulty one step per answer within 1..=10 and awards one point per
/// correct answer.
#[derive(Debug, Clone)]
pub struct InMemoryBackend {
    bank: Arc<Vec<BankQuestion>>,
    ledger: Arc<Mutex<Ledger>>,
}

impl InMemoryBackend {
    #[must_use]
    pub fn new(bank: Vec<BankQuestion>) -> Self {
        Self {
            bank: Arc::new(bank),
            ledger: Arc::new(Mutex::new(Ledger::default())),
        }
    }

    /// Backend seeded with a small arithmetic bank.
    #[must_use]
    pub fn with_sample_bank() -> Self {
        Self::new(sample_bank())
    }

    /// Every call received so far.
    #[must_use]
    pub fn calls(&self) -> Vec<BackendCall> {
        self.ledger
            .lock()
            .map(|ledger| ledger.calls.clone())
            .unwrap_or_default()
    }

    fn with_ledger<T>(
        &self,
        f: impl FnOnce(&mut Ledger) -> Result<T, RemoteError>,
    ) -> Result<T, RemoteError> {
        let mut guard = self
            .ledger
            .lock()
            .map_err(|e| RemoteError::Transport(e.to_string()))?;
        f(&mut guard)
    }

    fn pick(&self, difficulty: i32, seen: &[QuestionId]) -> Option<&BankQuestion> {
        self.bank
            .iter()
            .filter(|q| !seen.contains(&q.id))
            .min_by_key(|q| {
                (
                    (q.difficulty - difficulty).abs(),
                    q.difficulty > difficulty,
                    q.difficulty,
                    q.id.value(),
                )
            })
    }
}

fn invalid_attempt() -> RemoteError {
    RemoteError::Status {
        status: 400,
        message: "invalid attempt_id".to_owned(),
    }
}

#[async_trait]
impl QuizBackend for InMemoryBackend {
    async fn start(
        &self,
        mode: Mode,
        params: Map<String, Value>,
    ) -> Result<AttemptId, RemoteError> {
        self.with_ledger(|ledger| {
            ledger.calls.push(BackendCall::Start { mode, params });
            ledger.next_attempt += 1;
            let attempt_id = AttemptId::from_int(ledger.next_attempt);
            ledger
                .attempts
                .insert(attempt_id.clone(), AttemptRecord::default());
            Ok(attempt_id)
        })
    }

    async fn get_question(
        &self,
        mode: Mode,
        attempt_id: &AttemptId,
        last_outcome: Option<&LastOutcome>,
        state: &StateSnapshot,
    ) -> Result<QuestionReply, RemoteError> {
        self.with_ledger(|ledger| {
            ledger.calls.push(BackendCall::GetQuestion {
                mode,
                attempt_id: attempt_id.clone(),
                last_outcome: last_outcome.copied(),
                state: state.clone(),
            });
            let record = ledger
                .attempts
                .get_mut(attempt_id)
                .ok_or_else(invalid_attempt)?;
            for id in &state.seen_question_ids {
                if !record.seen.contains(id) {
                    record.seen.push(*id);
                }
            }

            let Some(next) = self.pick(state.current_difficulty, &record.seen) else {
                return Ok(QuestionReply::Finished {
                    message: Some(EXHAUSTED_MESSAGE.to_owned()),
                });
            };
            record.seen.push(next.id);
            Ok(QuestionReply::Question {
                question: next.to_question(),
                fragment: StateFragment {
                    current_difficulty: Some(state.current_difficulty),
                    seen_question_ids: Some(record.seen.clone()),
                },
            })
        })
    }

    async fn submit_answer(&self, submission: &AnswerSubmission) -> Result<Outcome, RemoteError> {
        self.with_ledger(|ledger| {
            ledger.calls.push(BackendCall::Submit(submission.clone()));
            let record = ledger
                .attempts
                .get_mut(&submission.attempt_id)
                .ok_or_else(invalid_attempt)?;
            if record.ended {
                return Err(RemoteError::Server("attempt already ended".to_owned()));
            }
            let question = self
                .bank
                .iter()
                .find(|q| q.id == submission.question_id)
                .ok_or_else(|| RemoteError::Server("invalid question_id".to_owned()))?;

            let correct = question.is_correct(&submission.selected);
            if correct {
                record.score += 1;
            }
            let step = if correct { 1 } else { -1 };
            let next = (submission.state.current_difficulty + step).clamp(MIN_DIFFICULTY, MAX_DIFFICULTY);

            Ok(Outcome {
                correct,
                attempt_score: Some(record.score),
                correct_answers: question.correct_texts(),
                next_difficulty: Some(next),
            })
        })
    }

    async fn end(&self, attempt_id: &AttemptId) -> Result<EndReply, RemoteError> {
        self.with_ledger(|ledger| {
            ledger.calls.push(BackendCall::End {
                attempt_id: attempt_id.clone(),
            });
            let record = ledger
                .attempts
                .get_mut(attempt_id)
                .ok_or_else(invalid_attempt)?;
            record.ended = true;
            Ok(EndReply {
                ok: true,
                attempt_id: Some(attempt_id.clone()),
            })
        })
    }
}

/// Arithmetic questions spread over difficulties 1 to 6.
#[must_use]
pub fn sample_bank() -> Vec<BankQuestion> {
    vec![
        BankQuestion::new(1, "1 + 1?", 1)
            .option("1")
            .correct_option("2")
            .option("3"),
        BankQuestion::new(2, "3 x 3?", 2)
            .option("6")
            .option("12")
            .correct_option("9"),
        BankQuestion::new(3, "2 + 2?", 3)
            .option("3")
            .correct_option("4"),
        BankQuestion::new(4, "15 - 7?", 3)
            .correct_option("8")
            .option("7")
            .option("9"),
        BankQuestion::new(5, "12 x 12?", 4)
            .option("124")
            .correct_option("144")
            .option("154"),
        BankQuestion::new(6, "Which are prime?", 5)
            .correct_option("7")
            .option("9")
            .correct_option("11")
            .option("15"),
        BankQuestion::new(7, "2 to the 10th?", 6)
            .option("512")
            .correct_option("1024")
            .option("2048"),
    ]
}
