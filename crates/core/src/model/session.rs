use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

use crate::model::ids::{AttemptId, QuestionId};
use crate::model::mode::Mode;
use crate::model::question::Outcome;

/// Difficulty a run starts at until the server says otherwise.
pub const DEFAULT_DIFFICULTY: i32 = 3;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionStateError {
    #[error("attempt {existing} is already bound to this run")]
    AttemptAlreadyBound { existing: AttemptId },
}

//
// ─── SEEN SET ──────────────────────────────────────────────────────────────────
//

/// Question ids already served in this run.
///
/// Append-only and duplicate-free; insertion order is kept so the list sent
/// back to the server is stable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeenSet {
    ids: Vec<QuestionId>,
}

impl SeenSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` when the id was not present before.
    pub fn insert(&mut self, id: QuestionId) -> bool {
        if self.ids.contains(&id) {
            return false;
        }
        self.ids.push(id);
        true
    }

    pub fn extend<I: IntoIterator<Item = QuestionId>>(&mut self, ids: I) {
        for id in ids {
            self.insert(id);
        }
    }

    #[must_use]
    pub fn contains(&self, id: QuestionId) -> bool {
        self.ids.contains(&id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    #[must_use]
    pub fn as_slice(&self) -> &[QuestionId] {
        &self.ids
    }
}

//
// ─── FRAGMENTS & SNAPSHOTS ─────────────────────────────────────────────────────
//

/// Progress fields reported by the server alongside a question.
///
/// `None` means the server omitted the field; the local value is kept.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StateFragment {
    pub current_difficulty: Option<i32>,
    pub seen_question_ids: Option<Vec<QuestionId>>,
}

/// Read-only copy of the session state sent with every request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateSnapshot {
    pub current_difficulty: i32,
    pub seen_question_ids: Vec<QuestionId>,
    pub run_deadline: Option<DateTime<Utc>>,
    pub run_duration_secs: Option<i64>,
}

//
// ─── SESSION STATE ─────────────────────────────────────────────────────────────
//

/// Mutable record of one run, owned by the flow coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    mode: Mode,
    attempt_id: Option<AttemptId>,
    current_difficulty: i32,
    seen: SeenSet,
    score: i64,
    run_deadline: Option<DateTime<Utc>>,
    run_duration_secs: Option<i64>,
}

impl SessionState {
    #[must_use]
    pub fn new(mode: Mode, initial_difficulty: i32) -> Self {
        Self {
            mode,
            attempt_id: None,
            current_difficulty: initial_difficulty,
            seen: SeenSet::new(),
            score: 0,
            run_deadline: None,
            run_duration_secs: None,
        }
    }

    /// Fix the run deadline at `started_at + duration_secs`.
    ///
    /// Only meaningful for the fixed-duration mode; call before the attempt starts.
    #[must_use]
    pub fn with_run_duration(mut self, started_at: DateTime<Utc>, duration_secs: i64) -> Self {
        self.run_deadline = Some(started_at + Duration::seconds(duration_secs));
        self.run_duration_secs = Some(duration_secs);
        self
    }

    #[must_use]
    pub fn mode(&self) -> Mode {
        self.mode
    }

    #[must_use]
    pub fn attempt_id(&self) -> Option<&AttemptId> {
        self.attempt_id.as_ref()
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.attempt_id.is_some()
    }

    #[must_use]
    pub fn current_difficulty(&self) -> i32 {
        self.current_difficulty
    }

    #[must_use]
    pub fn seen(&self) -> &SeenSet {
        &self.seen
    }

    #[must_use]
    pub fn score(&self) -> i64 {
        self.score
    }

    #[must_use]
    pub fn run_deadline(&self) -> Option<DateTime<Utc>> {
        self.run_deadline
    }

    /// Bind the attempt issued by the server and reset the score.
    ///
    /// # Errors
    ///
    /// Returns `SessionStateError::AttemptAlreadyBound` if the run already has an attempt.
    pub fn bind_attempt(&mut self, attempt_id: AttemptId) -> Result<(), SessionStateError> {
        if let Some(existing) = &self.attempt_id {
            return Err(SessionStateError::AttemptAlreadyBound {
                existing: existing.clone(),
            });
        }
        self.attempt_id = Some(attempt_id);
        self.score = 0;
        Ok(())
    }

    /// Merge server-reported progress.
    ///
    /// Omitted fields keep their local value. Seen ids are unioned so the set
    /// never shrinks, even if the server reports a shorter list.
    pub fn merge_fragment(&mut self, fragment: &StateFragment) {
        if let Some(difficulty) = fragment.current_difficulty {
            self.current_difficulty = difficulty;
        }
        if let Some(seen) = &fragment.seen_question_ids {
            self.seen.extend(seen.iter().copied());
        }
    }

    /// Returns `true` when the id was newly recorded.
    pub fn record_seen(&mut self, id: QuestionId) -> bool {
        self.seen.insert(id)
    }

    /// Take the authoritative score and any difficulty adjustment.
    ///
    /// A missing score keeps the last value the server reported.
    pub fn apply_outcome(&mut self, outcome: &Outcome) {
        if let Some(score) = outcome.attempt_score {
            self.score = score;
        }
        if let Some(next) = outcome.next_difficulty {
            self.current_difficulty = next;
        }
    }

    #[must_use]
    pub fn deadline_passed(&self, now: DateTime<Utc>) -> bool {
        self.run_deadline.is_some_and(|deadline| now >= deadline)
    }

    #[must_use]
    pub fn snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            current_difficulty: self.current_difficulty,
            seen_question_ids: self.seen.as_slice().to_vec(),
            run_deadline: self.run_deadline,
            run_duration_secs: self.run_duration_secs,
        }
    }
}
