#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Duration;
use serde_json::{Map, Value};

use quiz_core::Clock;
use tokio::time::sleep;
use quiz_core::model::{
    AnswerSubmission, AttemptId, LastOutcome, Mode, Outcome, Question, QuestionId, StateSnapshot,
};
use services::protocol::{self, EndReply, QuestionReply};
use services::{QuizBackend, RemoteError, RunUi, Severity, TimerReadout};

//
// ─── SCRIPTED BACKEND ──────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Start(Mode),
    GetQuestion {
        attempt_id: AttemptId,
        last_outcome: Option<LastOutcome>,
        state: StateSnapshot,
    },
    Submit(AnswerSubmission),
    End(AttemptId),
}

#[derive(Default)]
struct Script {
    starts: VecDeque<Result<AttemptId, RemoteError>>,
    questions: VecDeque<Result<QuestionReply, RemoteError>>,
    outcomes: VecDeque<Result<Outcome, RemoteError>>,
    ends: VecDeque<Result<EndReply, RemoteError>>,
}

/// Backend that replays queued replies and records every call.
///
/// Empty queues fall back to: attempt `A1`, `finished`, a server error for
/// submissions, and an acknowledged end.
#[derive(Clone, Default)]
pub struct ScriptedBackend {
    script: Arc<Mutex<Script>>,
    calls: Arc<Mutex<Vec<Call>>>,
    latency: Option<(Clock, Duration)>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance `clock` by `latency` on every call, as if the network were slow.
    pub fn with_latency(mut self, clock: Clock, latency: Duration) -> Self {
        self.latency = Some((clock, latency));
        self
    }

    pub fn start_reply(&self, reply: Result<AttemptId, RemoteError>) -> &Self {
        self.script.lock().unwrap().starts.push_back(reply);
        self
    }

    /// Queue a `get_question` body exactly as the server would send it.
    pub fn question_json(&self, body: Value) -> &Self {
        let reply = protocol::parse_question(body);
        self.script.lock().unwrap().questions.push_back(reply);
        self
    }

    pub fn question_error(&self, err: RemoteError) -> &Self {
        self.script.lock().unwrap().questions.push_back(Err(err));
        self
    }

    /// Queue a `submit_answer` body exactly as the server would send it.
    pub fn outcome_json(&self, body: Value) -> &Self {
        let reply = protocol::parse_outcome(body);
        self.script.lock().unwrap().outcomes.push_back(reply);
        self
    }

    pub fn outcome_error(&self, err: RemoteError) -> &Self {
        self.script.lock().unwrap().outcomes.push_back(Err(err));
        self
    }

    pub fn end_reply(&self, reply: Result<EndReply, RemoteError>) -> &Self {
        self.script.lock().unwrap().ends.push_back(reply);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn submissions(&self) -> Vec<AnswerSubmission> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Submit(submission) => Some(submission),
                _ => None,
            })
            .collect()
    }

    pub fn question_requests(&self) -> Vec<(Option<LastOutcome>, StateSnapshot)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::GetQuestion {
                    last_outcome,
                    state,
                    ..
                } => Some((last_outcome, state)),
                _ => None,
            })
            .collect()
    }

    pub fn end_calls(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, Call::End(_)))
            .count()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
        if let Some((clock, latency)) = &self.latency {
            clock.advance(*latency);
        }
    }
}

#[async_trait]
impl QuizBackend for ScriptedBackend {
    async fn start(
        &self,
        mode: Mode,
        _params: Map<String, Value>,
    ) -> Result<AttemptId, RemoteError> {
        self.record(Call::Start(mode));
        let reply = self.script.lock().unwrap().starts.pop_front();
        reply.unwrap_or_else(|| Ok(AttemptId::new("A1")))
    }

    async fn get_question(
        &self,
        _mode: Mode,
        attempt_id: &AttemptId,
        last_outcome: Option<&LastOutcome>,
        state: &StateSnapshot,
    ) -> Result<QuestionReply, RemoteError> {
        self.record(Call::GetQuestion {
            attempt_id: attempt_id.clone(),
            last_outcome: last_outcome.copied(),
            state: state.clone(),
        });
        let reply = self.script.lock().unwrap().questions.pop_front();
        reply.unwrap_or(Ok(QuestionReply::Finished { message: None }))
    }

    async fn submit_answer(&self, submission: &AnswerSubmission) -> Result<Outcome, RemoteError> {
        self.record(Call::Submit(submission.clone()));
        let reply = self.script.lock().unwrap().outcomes.pop_front();
        reply.unwrap_or_else(|| Err(RemoteError::Server("no scripted outcome".into())))
    }

    async fn end(&self, attempt_id: &AttemptId) -> Result<EndReply, RemoteError> {
        self.record(Call::End(attempt_id.clone()));
        let reply = self.script.lock().unwrap().ends.pop_front();
        reply.unwrap_or_else(|| {
            Ok(EndReply {
                ok: true,
                attempt_id: Some(attempt_id.clone()),
            })
        })
    }
}

//
// ─── SLOW BACKEND ──────────────────────────────────────────────────────────────
//

/// Wraps another backend and sleeps on the tokio clock before each call.
#[derive(Clone)]
pub struct SlowBackend {
    inner: Arc<dyn QuizBackend>,
    question_latency: std::time::Duration,
    submit_latency: std::time::Duration,
}

impl SlowBackend {
    pub fn new(inner: Arc<dyn QuizBackend>) -> Self {
        Self {
            inner,
            question_latency: std::time::Duration::ZERO,
            submit_latency: std::time::Duration::ZERO,
        }
    }

    pub fn question_latency(mut self, latency: std::time::Duration) -> Self {
        self.question_latency = latency;
        self
    }

    pub fn submit_latency(mut self, latency: std::time::Duration) -> Self {
        self.submit_latency = latency;
        self
    }
}

#[async_trait]
impl QuizBackend for SlowBackend {
    async fn start(&self, mode: Mode, params: Map<String, Value>) -> Result<AttemptId, RemoteError> {
        self.inner.start(mode, params).await
    }

    async fn get_question(
        &self,
        mode: Mode,
        attempt_id: &AttemptId,
        last_outcome: Option<&LastOutcome>,
        state: &StateSnapshot,
    ) -> Result<QuestionReply, RemoteError> {
        delay(self.question_latency).await;
        self.inner
            .get_question(mode, attempt_id, last_outcome, state)
            .await
    }

    async fn submit_answer(&self, submission: &AnswerSubmission) -> Result<Outcome, RemoteError> {
        delay(self.submit_latency).await;
        self.inner.submit_answer(submission).await
    }

    async fn end(&self, attempt_id: &AttemptId) -> Result<EndReply, RemoteError> {
        self.inner.end(attempt_id).await
    }
}

async fn delay(latency: std::time::Duration) {
    if !latency.is_zero() {
        sleep(latency).await;
    }
}

//
// ─── RECORDING UI ──────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq)]
pub enum UiEvent {
    Question(QuestionId),
    Notify(String, Severity),
    Results(AttemptId),
    EnterImmersive,
    ExitImmersive,
    Score(i64),
    Timer(String),
    AskedDuration,
}

#[derive(Clone, Default)]
pub struct RecordingUi {
    events: Arc<Mutex<Vec<UiEvent>>>,
    shown: Arc<Mutex<Vec<Question>>>,
    duration_answer: Option<i64>,
}

impl RecordingUi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn answering_duration(secs: i64) -> Self {
        Self {
            duration_answer: Some(secs),
            ..Self::default()
        }
    }

    pub fn events(&self) -> Vec<UiEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn scores(&self) -> Vec<i64> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                UiEvent::Score(score) => Some(score),
                _ => None,
            })
            .collect()
    }

    pub fn notices(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                UiEvent::Notify(text, _) => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn timers(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                UiEvent::Timer(text) => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn shown(&self) -> Vec<Question> {
        self.shown.lock().unwrap().clone()
    }

    pub fn questions_shown(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, UiEvent::Question(_)))
            .count()
    }

    fn push(&self, event: UiEvent) {
        self.events.lock().unwrap().push(event);
    }
}

#[async_trait]
impl RunUi for RecordingUi {
    fn show_question(&self, question: &Question) {
        self.shown.lock().unwrap().push(question.clone());
        self.push(UiEvent::Question(question.id));
    }

    fn notify(&self, text: &str, severity: Severity) {
        self.push(UiEvent::Notify(text.to_owned(), severity));
    }

    async fn ask_duration(&self) -> Option<i64> {
        self.push(UiEvent::AskedDuration);
        self.duration_answer
    }

    fn go_to_results(&self, attempt_id: &AttemptId) {
        self.push(UiEvent::Results(attempt_id.clone()));
    }

    fn enter_immersive(&self) {
        self.push(UiEvent::EnterImmersive);
    }

    fn exit_immersive(&self) {
        self.push(UiEvent::ExitImmersive);
    }

    fn show_score(&self, score: i64) {
        self.push(UiEvent::Score(score));
    }

    fn show_timer(&self, readout: &TimerReadout) {
        self.push(UiEvent::Timer(readout.to_string()));
    }
}
