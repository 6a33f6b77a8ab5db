//! JSON bodies exchanged with the scoring authority.
//!
//! Requests are built from domain types; responses are read leniently from
//! `serde_json::Value` so malformed fields degrade instead of failing the
//! whole payload.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use quiz_core::model::{
    AnswerOption, AnswerSubmission, AttemptId, LastOutcome, Mode, OptionId, Outcome, Question,
    QuestionId, StateFragment, StateSnapshot,
};

use crate::error::RemoteError;

pub const START_ATTEMPT: &str = "start_attempt";
pub const GET_QUESTION: &str = "get_question";
pub const SUBMIT_ANSWER: &str = "submit_answer";
pub const END_ATTEMPT: &str = "end_attempt";

//
// ─── COERCION ──────────────────────────────────────────────────────────────────
//

/// Read an integer from a JSON number or numeric string.
///
/// Floats with a fractional part, booleans, nulls and anything else yield `None`.
#[must_use]
pub fn coerce_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && f.is_finite())
                .map(|f| f as i64)
        }),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

fn coerce_i32(value: &Value) -> Option<i32> {
    coerce_int(value).and_then(|v| i32::try_from(v).ok())
}

fn display_scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Extract an explicit `error` field from an otherwise well-formed body.
#[must_use]
pub fn error_field(body: &Value) -> Option<String> {
    let err = body.get("error").filter(|v| is_truthy(v))?;
    Some(display_scalar(err).unwrap_or_else(|| err.to_string()))
}

//
// ─── REQUESTS ──────────────────────────────────────────────────────────────────
//

/// Session state as the server reads it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WireState {
    pub current_diff: i32,
    pub seen_qids: Vec<QuestionId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_left_total: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minute_rush_end: Option<i64>,
}

impl From<&StateSnapshot> for WireState {
    fn from(snapshot: &StateSnapshot) -> Self {
        Self {
            current_diff: snapshot.current_difficulty,
            seen_qids: snapshot.seen_question_ids.clone(),
            time_left_total: snapshot.run_duration_secs,
            minute_rush_end: snapshot.run_deadline.map(|d| d.timestamp_millis()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WireLastOutcome {
    pub correct: bool,
    pub qid: QuestionId,
    pub difficulty: Option<i32>,
}

impl From<&LastOutcome> for WireLastOutcome {
    fn from(last: &LastOutcome) -> Self {
        Self {
            correct: last.correct,
            qid: last.question_id,
            difficulty: last.difficulty,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StartRequest {
    pub mode: Mode,
    pub params: Map<String, Value>,
}

#[derive(Debug, Serialize)]
pub struct QuestionRequest<'a> {
    pub mode: Mode,
    pub attempt_id: &'a AttemptId,
    pub last_outcome: Option<WireLastOutcome>,
    pub state: WireState,
}

#[derive(Debug, Serialize)]
pub struct SubmitRequest<'a> {
    pub attempt_id: &'a AttemptId,
    pub question_id: QuestionId,
    pub selected: &'a [OptionId],
    pub mode: Mode,
    pub time_used: Option<f64>,
    pub state: WireState,
}

impl<'a> From<&'a AnswerSubmission> for SubmitRequest<'a> {
    fn from(sub: &'a AnswerSubmission) -> Self {
        Self {
            attempt_id: &sub.attempt_id,
            question_id: sub.question_id,
            selected: &sub.selected,
            mode: sub.mode,
            time_used: sub.time_used,
            state: WireState::from(&sub.state),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct EndRequest<'a> {
    pub attempt_id: &'a AttemptId,
}

//
// ─── RESPONSES ─────────────────────────────────────────────────────────────────
//

/// Reply to `get_question`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuestionReply {
    Question {
        question: Question,
        fragment: StateFragment,
    },
    Finished {
        message: Option<String>,
    },
}

/// Reply to `end_attempt`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndReply {
    pub ok: bool,
    pub attempt_id: Option<AttemptId>,
}

#[derive(Debug, Deserialize)]
struct RawStart {
    attempt_id: Option<AttemptId>,
}

#[derive(Debug, Default, Deserialize)]
struct RawQuestion {
    #[serde(default)]
    id: Value,
    prompt: Option<String>,
    #[serde(default)]
    difficulty: Value,
    #[serde(default)]
    options: Vec<RawOption>,
    qtype: Option<String>,
    state: Option<RawFragment>,
}

#[derive(Debug, Deserialize)]
struct RawOption {
    id: OptionId,
    text: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawFragment {
    #[serde(default)]
    current_diff: Value,
    seen_qids: Option<Vec<Value>>,
}

#[derive(Debug, Default, Deserialize)]
struct RawOutcome {
    #[serde(default)]
    correct: Value,
    #[serde(default)]
    attempt_score: Value,
    correct_answers: Option<Vec<Value>>,
    adjustment: Option<RawAdjustment>,
}

#[derive(Debug, Default, Deserialize)]
struct RawAdjustment {
    #[serde(default)]
    next_diff: Value,
}

#[derive(Debug, Deserialize)]
struct RawEnd {
    #[serde(default)]
    ok: Value,
    attempt_id: Option<AttemptId>,
}

fn invalid(what: &str, err: impl std::fmt::Display) -> RemoteError {
    RemoteError::InvalidBody(format!("malformed {what} payload: {err}"))
}

/// Parse the `start_attempt` reply.
///
/// # Errors
///
/// Returns `RemoteError::InvalidBody` when no attempt id is present.
pub fn parse_start(body: Value) -> Result<AttemptId, RemoteError> {
    let raw: RawStart = serde_json::from_value(body).map_err(|e| invalid("start", e))?;
    raw.attempt_id
        .ok_or_else(|| RemoteError::InvalidBody("start reply has no attempt_id".into()))
}

impl RawFragment {
    fn into_fragment(self) -> StateFragment {
        StateFragment {
            current_difficulty: coerce_i32(&self.current_diff),
            seen_question_ids: self.seen_qids.map(|raw| {
                raw.iter()
                    .filter_map(coerce_int)
                    .map(QuestionId::new)
                    .collect()
            }),
        }
    }
}

/// Parse the `get_question` reply.
///
/// Seen ids that fail integer coercion are dropped.
///
/// # Errors
///
/// Returns `RemoteError::InvalidBody` when a question payload has no usable id.
pub fn parse_question(body: Value) -> Result<QuestionReply, RemoteError> {
    if body.get("finished").is_some_and(is_truthy) {
        let message = body.get("message").and_then(display_scalar);
        return Ok(QuestionReply::Finished { message });
    }

    let raw: RawQuestion = serde_json::from_value(body).map_err(|e| invalid("question", e))?;
    let id = coerce_int(&raw.id)
        .map(QuestionId::new)
        .ok_or_else(|| RemoteError::InvalidBody("question payload has no usable id".into()))?;

    let question = Question {
        id,
        prompt: raw.prompt.unwrap_or_else(|| "No prompt".to_owned()),
        difficulty: coerce_i32(&raw.difficulty),
        options: raw
            .options
            .into_iter()
            .map(|o| AnswerOption {
                id: o.id,
                text: o.text.unwrap_or_else(|| "Option".to_owned()),
            })
            .collect(),
        qtype: raw.qtype,
    };
    let fragment = raw.state.map(RawFragment::into_fragment).unwrap_or_default();

    Ok(QuestionReply::Question { question, fragment })
}

/// Parse the `submit_answer` reply.
///
/// # Errors
///
/// Returns `RemoteError::InvalidBody` when the body is not an object.
pub fn parse_outcome(body: Value) -> Result<Outcome, RemoteError> {
    let raw: RawOutcome = serde_json::from_value(body).map_err(|e| invalid("outcome", e))?;
    Ok(Outcome {
        correct: is_truthy(&raw.correct),
        attempt_score: coerce_int(&raw.attempt_score),
        correct_answers: raw
            .correct_answers
            .unwrap_or_default()
            .iter()
            .filter_map(display_scalar)
            .collect(),
        next_difficulty: raw
            .adjustment
            .and_then(|adj| coerce_i32(&adj.next_diff))
            .filter(|next| *next != 0),
    })
}

/// Parse the `end_attempt` reply.
///
/// # Errors
///
/// Returns `RemoteError::InvalidBody` when the body is not an object.
pub fn parse_end(body: Value) -> Result<EndReply, RemoteError> {
    let raw: RawEnd = serde_json::from_value(body).map_err(|e| invalid("end", e))?;
    Ok(EndReply {
        ok: is_truthy(&raw.ok),
        attempt_id: raw.attempt_id,
    })
}
