use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::time::{self, MissedTickBehavior};
use tracing::debug;

use quiz_core::model::{Mode, OptionId, QuestionId};

use crate::error::RunError;

use super::coordinator::QuizRun;
use super::summary::RunSummary;

const COMMAND_BUFFER: usize = 16;

/// Player input forwarded to a running driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunCommand {
    /// Selection for the question that was on screen when the player chose.
    Answer {
        question_id: QuestionId,
        selected: Vec<OptionId>,
    },
    /// Resend a submission held after a failure.
    Retry,
    End,
}

/// Cloneable sender side of a `RunDriver`.
///
/// Dropping every handle ends the run.
#[derive(Debug, Clone)]
pub struct RunHandle {
    commands: mpsc::Sender<RunCommand>,
    stop: Arc<watch::Sender<bool>>,
}

impl RunHandle {
    /// Returns `false` once the driver has stopped.
    ///
    /// `End` also cuts short any remote call the run is waiting on.
    pub async fn send(&self, command: RunCommand) -> bool {
        if command == RunCommand::End {
            self.stop.send_replace(true);
        }
        self.commands.send(command).await.is_ok()
    }

    pub async fn answer(&self, question_id: QuestionId, selected: Vec<OptionId>) -> bool {
        self.send(RunCommand::Answer {
            question_id,
            selected,
        })
        .await
    }

    pub async fn end(&self) -> bool {
        self.send(RunCommand::End).await
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }
}

/// Event loop that feeds player commands and clock ticks into one `QuizRun`.
pub struct RunDriver {
    run: QuizRun,
    commands: mpsc::Receiver<RunCommand>,
}

impl RunDriver {
    #[must_use]
    pub fn new(run: QuizRun) -> (Self, RunHandle) {
        let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
        let (stop_tx, stop_rx) = watch::channel(false);
        (
            Self {
                run: run.with_stop_signal(stop_rx),
                commands: rx,
            },
            RunHandle {
                commands: tx,
                stop: Arc::new(stop_tx),
            },
        )
    }

    /// Start `mode` and drive the run until it finishes.
    ///
    /// # Errors
    ///
    /// Returns `RunError` if the attempt could not be started.
    pub async fn run(mut self, mode: Mode) -> Result<RunSummary, RunError> {
        self.run.select_mode(mode).await?;

        let mut ticker = time::interval(self.run.tick_period());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        while !self.run.phase().is_terminal() {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(RunCommand::Answer { question_id, selected }) => {
                        self.run.answer_question(question_id, selected).await;
                    }
                    Some(RunCommand::Retry) => {
                        if let Err(err) = self.run.retry_submission().await {
                            debug!(error = %err, "retry ignored");
                        }
                    }
                    Some(RunCommand::End) | None => {
                        self.run.end_run().await?;
                    }
                },
                _ = ticker.tick() => self.run.tick().await,
            }
        }

        self.run.summary().cloned().ok_or(RunError::NoActiveAttempt)
    }
}
