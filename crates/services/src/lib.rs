#![forbid(unsafe_code)]

pub mod client;
pub mod config;
pub mod error;
pub mod memory;
pub mod protocol;
pub mod run;
pub mod timer;

pub use quiz_core::Clock;

pub use client::{HttpQuizBackend, QuizBackend};
pub use config::{BackendConfig, RunConfig, SubmitErrorPolicy};
pub use error::{ConfigError, RemoteError, RunError};
pub use memory::{BackendCall, BankQuestion, InMemoryBackend};
pub use protocol::{EndReply, QuestionReply};
pub use timer::{TimerFired, TimerReadout, TimerService};

pub use run::{
    AnswerDisposition, EndReason, QuizRun, RunCommand, RunDriver, RunHandle, RunPhase, RunSummary,
    RunUi, Severity,
};
