use std::future::{Future, pending};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::Map;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use quiz_core::Clock;
use quiz_core::duration::resolve_run_secs;
use quiz_core::model::{
    AnswerSubmission, LastOutcome, Mode, OptionId, Outcome, Question, QuestionId, SessionState,
    StateFragment,
};
use quiz_core::policy::PolicyTable;
use quiz_core::time::seconds_two_decimals;

use crate::client::QuizBackend;
use crate::config::{RunConfig, SubmitErrorPolicy};
use crate::error::{RemoteError, RunError};
use crate::protocol::QuestionReply;
use crate::timer::{TimerFired, TimerService};

use super::phase::RunPhase;
use super::summary::{EndReason, RunSummary};
use super::ui::{RunUi, Severity};

const FINISHED_MESSAGE: &str = "All questions completed!";
const TIME_UP_MESSAGE: &str = "Time's up!";
const END_REJECTED_MESSAGE: &str = "Could not finish attempt.";

/// What happened to an answer event.
#[derive(Debug, Clone, PartialEq)]
pub enum AnswerDisposition {
    /// The answer was sent and the server returned a verdict.
    Submitted(Outcome),
    /// The answer was sent but the call failed.
    Failed(RemoteError),
    /// No question was open for answers, or a submission was already in flight.
    Ignored,
    /// The run ended before the server replied; the verdict is unknown.
    Abandoned,
}

/// Why an awaited call was cut short.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Interrupt {
    Deadline,
    Stop,
}

enum Raced<T> {
    Done(T),
    Interrupted(Interrupt),
}

#[derive(Debug, Clone)]
struct ActiveQuestion {
    question: Question,
    started_at: DateTime<Utc>,
}

/// Question flow coordinator for one run.
///
/// Owns the session state, the timers and the answer lock. Every event
/// (mode selection, answers, ticks, end requests) goes through `&mut self`,
/// so events are applied one at a time in arrival order.
pub struct QuizRun {
    backend: Arc<dyn QuizBackend>,
    ui: Arc<dyn RunUi>,
    clock: Clock,
    config: RunConfig,
    policies: PolicyTable,
    phase: RunPhase,
    session: Option<SessionState>,
    current: Option<ActiveQuestion>,
    last_outcome: Option<LastOutcome>,
    timers: TimerService,
    answer_locked: bool,
    held: Option<AnswerSubmission>,
    answered: u32,
    immersive: bool,
    stop: Option<watch::Receiver<bool>>,
    summary: Option<RunSummary>,
}

impl QuizRun {
    #[must_use]
    pub fn new(backend: Arc<dyn QuizBackend>, ui: Arc<dyn RunUi>) -> Self {
        Self {
            backend,
            ui,
            clock: Clock::system(),
            config: RunConfig::default(),
            policies: PolicyTable::standard(),
            phase: RunPhase::Idle,
            session: None,
            current: None,
            last_outcome: None,
            timers: TimerService::new(),
            answer_locked: false,
            held: None,
            answered: 0,
            immersive: false,
            stop: None,
            summary: None,
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn with_config(mut self, config: RunConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn with_policies(mut self, policies: PolicyTable) -> Self {
        self.policies = policies;
        self
    }

    /// End the run as soon as `stop` turns `true` or its sender is dropped,
    /// even while a remote call is still waiting for a reply.
    #[must_use]
    pub fn with_stop_signal(mut self, stop: watch::Receiver<bool>) -> Self {
        self.stop = Some(stop);
        self
    }

    #[must_use]
    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    #[must_use]
    pub fn session(&self) -> Option<&SessionState> {
        self.session.as_ref()
    }

    #[must_use]
    pub fn current_question(&self) -> Option<&Question> {
        self.current.as_ref().map(|active| &active.question)
    }

    #[must_use]
    pub fn is_answer_locked(&self) -> bool {
        self.answer_locked
    }

    #[must_use]
    pub fn has_held_submission(&self) -> bool {
        self.held.is_some()
    }

    #[must_use]
    pub fn summary(&self) -> Option<&RunSummary> {
        self.summary.as_ref()
    }

    #[must_use]
    pub fn tick_period(&self) -> Duration {
        self.config.tick
    }

    //
    // ─── EVENTS ────────────────────────────────────────────────────────────────
    //

    /// Start a run in `mode` and fetch the first question.
    ///
    /// Fixed-duration modes ask the collaborator for a length first; an
    /// unusable answer falls back to the configured default.
    ///
    /// # Errors
    ///
    /// Returns `RunError::AlreadyStarted` if this run left `Idle` before, and
    /// `RunError::StartFailed` if the server refused the attempt. In the latter
    /// case the run is back in `Idle` with the UI restored.
    pub async fn select_mode(&mut self, mode: Mode) -> Result<(), RunError> {
        if self.phase != RunPhase::Idle {
            error!(phase = %self.phase, %mode, "mode selected on a run that already started");
            return Err(RunError::AlreadyStarted);
        }
        self.phase = RunPhase::Starting;

        let mut session = SessionState::new(mode, self.config.initial_difficulty);
        if self.policies.asks_duration(mode) {
            let raw = self.ui.ask_duration().await;
            let (secs, rejected) = resolve_run_secs(raw, self.config.default_run_secs);
            if let Some(err) = rejected {
                warn!(error = %err, fallback_secs = secs, "using default run duration");
            }
            session = session.with_run_duration(self.clock.now(), secs);
        }

        self.ui.enter_immersive();
        self.immersive = true;

        let attempt_id = match self.backend.start(mode, Map::new()).await {
            Ok(attempt_id) => attempt_id,
            Err(err) => {
                warn!(%mode, error = %err, "could not start attempt");
                self.ui.notify(err.message(), Severity::Error);
                self.restore_chrome();
                self.phase = RunPhase::Idle;
                return Err(RunError::StartFailed(err));
            }
        };
        info!(%mode, %attempt_id, deadline = ?session.run_deadline(), "run started");
        session.bind_attempt(attempt_id)?;

        if let Some(deadline) = session.run_deadline() {
            self.timers.start_run_countdown(deadline);
        }
        self.ui.show_score(session.score());
        self.session = Some(session);

        self.fetch_next().await;
        Ok(())
    }

    /// Submit the player's selection for the open question.
    ///
    /// Ignored unless a question is open and no submission is in flight.
    pub async fn answer(&mut self, selected: Vec<OptionId>) -> AnswerDisposition {
        if self.phase != RunPhase::Answering || self.answer_locked {
            debug!(phase = %self.phase, locked = self.answer_locked, "answer ignored");
            return AnswerDisposition::Ignored;
        }
        if self.expire_if_due().await {
            return AnswerDisposition::Ignored;
        }
        self.submit(selected).await
    }

    /// Submit `selected` for `question_id`.
    ///
    /// Input aimed at a question that is no longer open, or naming options it
    /// does not offer, is ignored. Clicks queued while an earlier submission
    /// was in flight land here once the next question is up.
    pub async fn answer_question(
        &mut self,
        question_id: QuestionId,
        selected: Vec<OptionId>,
    ) -> AnswerDisposition {
        let Some(active) = &self.current else {
            debug!(%question_id, "answer for a question that is not on screen");
            return AnswerDisposition::Ignored;
        };
        let question = &active.question;
        if question.id != question_id {
            debug!(%question_id, open = %question.id, "stale answer ignored");
            return AnswerDisposition::Ignored;
        }
        if let Some(unknown) = selected.iter().find(|id| !question.has_option(id)) {
            debug!(%question_id, option = %unknown, "answer names an unknown option");
            return AnswerDisposition::Ignored;
        }
        self.answer(selected).await
    }

    /// Advance timers: fire the run deadline, auto-submit on question expiry,
    /// or push the current readout to the display.
    pub async fn tick(&mut self) {
        if !self.phase.is_active() || self.timers.is_idle() {
            return;
        }
        let now = self.clock.now();
        match self.timers.poll(now) {
            Some(TimerFired::RunExpired) => self.time_up().await,
            Some(TimerFired::QuestionExpired) => {
                if self.phase == RunPhase::Answering && !self.answer_locked {
                    debug!("question timer expired, submitting empty selection");
                    self.submit(Vec::new()).await;
                }
            }
            None => {
                if self.deadline_passed(now) {
                    self.time_up().await;
                } else {
                    self.push_timer_readout(now);
                }
            }
        }
    }

    /// Resend a submission held after a failure.
    ///
    /// # Errors
    ///
    /// Returns `RunError::NothingToRetry` when no submission is held.
    pub async fn retry_submission(&mut self) -> Result<AnswerDisposition, RunError> {
        let Some(submission) = self.held.take() else {
            return Err(RunError::NothingToRetry);
        };
        if self.expire_if_due().await {
            return Ok(AnswerDisposition::Ignored);
        }
        info!(question_id = %submission.question_id, "retrying held submission");
        Ok(self.send_submission(submission).await)
    }

    /// Finish the run on the player's request.
    ///
    /// Calling this on a run that already finished returns the existing summary.
    ///
    /// # Errors
    ///
    /// Returns `RunError::NoActiveAttempt` if the run never started.
    pub async fn end_run(&mut self) -> Result<RunSummary, RunError> {
        if matches!(self.phase, RunPhase::Idle | RunPhase::Starting) {
            error!(phase = %self.phase, "end requested without an active attempt");
            return Err(RunError::NoActiveAttempt);
        }
        self.finish(EndReason::UserEnded)
            .await
            .ok_or(RunError::NoActiveAttempt)
    }

    //
    // ─── TRANSITIONS ───────────────────────────────────────────────────────────
    //

    async fn fetch_next(&mut self) {
        self.phase = RunPhase::FetchingQuestion;
        self.current = None;

        let Some(session) = &self.session else {
            error!("fetch requested without a session");
            self.finish(EndReason::Failed).await;
            return;
        };
        let Some(attempt_id) = session.attempt_id().cloned() else {
            error!("fetch requested without an active attempt");
            self.finish(EndReason::Failed).await;
            return;
        };
        let mode = session.mode();
        let snapshot = session.snapshot();

        if self.expire_if_due().await {
            return;
        }
        let call = self
            .backend
            .get_question(mode, &attempt_id, self.last_outcome.as_ref(), &snapshot);
        let reply = match self.race(call).await {
            Raced::Done(reply) => reply,
            Raced::Interrupted(cause) => {
                debug!(%attempt_id, ?cause, "question request abandoned");
                self.interrupted(cause).await;
                return;
            }
        };
        if self.expire_if_due().await {
            return;
        }

        match reply {
            Ok(QuestionReply::Question { question, fragment }) => self.present(question, &fragment),
            Ok(QuestionReply::Finished { message }) => {
                info!(%attempt_id, "server reported no more questions");
                self.ui
                    .notify(message.as_deref().unwrap_or(FINISHED_MESSAGE), Severity::Info);
                pause(self.config.finish_delay).await;
                self.finish(EndReason::Exhausted).await;
            }
            Err(err) => {
                self.ui.notify(err.message(), Severity::Error);
                pause(self.config.error_delay).await;
                self.finish(EndReason::Failed).await;
            }
        }
    }

    fn present(&mut self, question: Question, fragment: &StateFragment) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        session.merge_fragment(fragment);
        session.record_seen(question.id);
        let strategy = self.policies.timer_for(session.mode(), session);

        self.ui.show_question(&question);
        let started_at = self.clock.now();
        self.timers.start_question(strategy, started_at);
        debug!(question_id = %question.id, ?strategy, "question presented");

        self.current = Some(ActiveQuestion {
            question,
            started_at,
        });
        self.answer_locked = false;
        self.phase = RunPhase::Answering;
        self.push_timer_readout(started_at);
    }

    async fn submit(&mut self, selected: Vec<OptionId>) -> AnswerDisposition {
        // Lock and disarm before anything can await.
        self.answer_locked = true;
        self.timers.cancel_question();
        self.phase = RunPhase::Submitting;

        let Some(submission) = self.build_submission(selected) else {
            error!("submission without an active attempt or question");
            self.finish(EndReason::Failed).await;
            return AnswerDisposition::Ignored;
        };
        self.send_submission(submission).await
    }

    fn build_submission(&self, selected: Vec<OptionId>) -> Option<AnswerSubmission> {
        let session = self.session.as_ref()?;
        let active = self.current.as_ref()?;
        Some(AnswerSubmission {
            attempt_id: session.attempt_id()?.clone(),
            question_id: active.question.id,
            selected,
            mode: session.mode(),
            time_used: Some(seconds_two_decimals(
                self.clock.elapsed_since(active.started_at),
            )),
            state: session.snapshot(),
        })
    }

    async fn send_submission(&mut self, submission: AnswerSubmission) -> AnswerDisposition {
        let reply = match self.race(self.backend.submit_answer(&submission)).await {
            Raced::Done(reply) => reply,
            Raced::Interrupted(cause) => {
                warn!(question_id = %submission.question_id, ?cause, "submission abandoned");
                self.interrupted(cause).await;
                return AnswerDisposition::Abandoned;
            }
        };
        match reply {
            Ok(outcome) => {
                self.accept_outcome(&submission, &outcome).await;
                AnswerDisposition::Submitted(outcome)
            }
            Err(err) => {
                self.ui.notify(err.message(), Severity::Error);
                match self.config.on_submit_error {
                    SubmitErrorPolicy::Finish => {
                        self.finish(EndReason::Failed).await;
                    }
                    SubmitErrorPolicy::Hold => {
                        warn!(question_id = %submission.question_id, error = %err, "submission held for retry");
                        self.held = Some(submission);
                        self.expire_if_due().await;
                    }
                }
                AnswerDisposition::Failed(err)
            }
        }
    }

    async fn accept_outcome(&mut self, submission: &AnswerSubmission, outcome: &Outcome) {
        self.answered += 1;
        let difficulty = self
            .current
            .as_ref()
            .and_then(|active| active.question.difficulty);
        let Some(session) = self.session.as_mut() else {
            return;
        };
        session.apply_outcome(outcome);
        let mode = session.mode();
        self.ui.show_score(session.score());

        let severity = if outcome.correct {
            Severity::Success
        } else {
            Severity::Error
        };
        self.ui.notify(&outcome.verdict_text(), severity);
        debug!(
            question_id = %submission.question_id,
            correct = outcome.correct,
            score = session.score(),
            "outcome applied"
        );

        self.last_outcome = Some(LastOutcome {
            correct: outcome.correct,
            question_id: submission.question_id,
            difficulty,
        });

        if !outcome.correct && self.policies.ends_on_wrong(mode) {
            self.finish(EndReason::WrongAnswer).await;
            return;
        }
        if self.expire_if_due().await {
            return;
        }
        if let Raced::Interrupted(cause) = self.race(pause(self.config.feedback_delay)).await {
            self.interrupted(cause).await;
            return;
        }
        self.fetch_next().await;
    }

    async fn time_up(&mut self) {
        info!("run deadline passed");
        self.ui.notify(TIME_UP_MESSAGE, Severity::Error);
        self.finish(EndReason::TimeUp).await;
    }

    async fn interrupted(&mut self, cause: Interrupt) {
        match cause {
            Interrupt::Deadline => self.time_up().await,
            Interrupt::Stop => {
                self.finish(EndReason::UserEnded).await;
            }
        }
    }

    /// Await `call` unless the run deadline passes or a stop is requested first.
    async fn race<T>(&self, call: impl Future<Output = T>) -> Raced<T> {
        tokio::select! {
            biased;
            out = call => Raced::Done(out),
            () = sleep_for(self.time_to_deadline()) => Raced::Interrupted(Interrupt::Deadline),
            () = stop_requested(self.stop.clone()) => Raced::Interrupted(Interrupt::Stop),
        }
    }

    /// Finish once the run deadline has passed. Returns whether it did.
    async fn expire_if_due(&mut self) -> bool {
        let due = self.deadline_passed(self.clock.now());
        if due {
            self.time_up().await;
        }
        due
    }

    /// Cancel every timer, restore the UI and close the attempt.
    ///
    /// Idempotent: later calls return the first summary.
    async fn finish(&mut self, reason: EndReason) -> Option<RunSummary> {
        if let Some(summary) = &self.summary {
            return Some(summary.clone());
        }
        self.phase = RunPhase::Finishing;
        self.timers.cancel_all();
        self.answer_locked = true;
        self.held = None;
        self.current = None;
        self.restore_chrome();

        let Some(session) = &self.session else {
            error!(%reason, "finishing a run that never started");
            self.phase = RunPhase::Finished;
            return None;
        };
        let attempt_id = session.attempt_id().cloned();
        let mut closed = false;
        match &attempt_id {
            None => error!(%reason, "finishing without an active attempt"),
            Some(attempt_id) => match self.backend.end(attempt_id).await {
                Ok(reply) if reply.ok => {
                    closed = true;
                    let target = reply.attempt_id.unwrap_or_else(|| attempt_id.clone());
                    self.ui.go_to_results(&target);
                }
                Ok(_) => self.ui.notify(END_REJECTED_MESSAGE, Severity::Error),
                Err(err) => {
                    warn!(%attempt_id, error = %err, "could not end attempt");
                    self.ui.notify(err.message(), Severity::Error);
                }
            },
        }

        let summary = RunSummary {
            attempt_id,
            mode: session.mode(),
            score: session.score(),
            answered: self.answered,
            reason,
            closed,
        };
        info!(
            mode = %summary.mode,
            score = summary.score,
            answered = summary.answered,
            %reason,
            closed,
            "run finished"
        );
        self.phase = RunPhase::Finished;
        self.summary = Some(summary.clone());
        Some(summary)
    }

    //
    // ─── HELPERS ───────────────────────────────────────────────────────────────
    //

    fn deadline_passed(&self, now: DateTime<Utc>) -> bool {
        self.session
            .as_ref()
            .is_some_and(|session| session.deadline_passed(now))
    }

    /// Wall time left before the run deadline.
    ///
    /// `None` without a deadline, or when a manual clock stands in for wall time.
    fn time_to_deadline(&self) -> Option<Duration> {
        if self.clock.is_manual() {
            return None;
        }
        let deadline = self.session.as_ref()?.run_deadline()?;
        Some((deadline - self.clock.now()).to_std().unwrap_or(Duration::ZERO))
    }

    fn restore_chrome(&mut self) {
        if self.immersive {
            self.immersive = false;
            self.ui.exit_immersive();
        }
    }

    fn push_timer_readout(&self, now: DateTime<Utc>) {
        if let Some(readout) = self.timers.readout(now) {
            self.ui.show_timer(&readout);
        }
    }
}

async fn pause(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}

async fn sleep_for(delay: Option<Duration>) {
    match delay {
        Some(delay) => tokio::time::sleep(delay).await,
        None => pending().await,
    }
}

/// Resolves once a stop is requested or every sender is gone.
async fn stop_requested(stop: Option<watch::Receiver<bool>>) {
    match stop {
        Some(mut stop) => {
            let _ = stop.wait_for(|stopped| *stopped).await;
        }
        None => pending().await,
    }
}
