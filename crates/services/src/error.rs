//! Shared error types for the services crate.

use thiserror::Error;

use quiz_core::model::SessionStateError;

/// Single error shape produced by every remote session call.
///
/// Transport failures, non-2xx statuses, unparsable bodies and explicit
/// `error` fields all end up here so the coordinator branches on one type.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum RemoteError {
    #[error("{0}")]
    Transport(String),
    #[error("{message}")]
    Status { status: u16, message: String },
    #[error("{0}")]
    InvalidBody(String),
    #[error("{0}")]
    Server(String),
}

impl RemoteError {
    /// Text suitable for a transient notification.
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            RemoteError::Transport(message)
            | RemoteError::InvalidBody(message)
            | RemoteError::Server(message)
            | RemoteError::Status { message, .. } => message,
        }
    }

    #[must_use]
    pub fn is_transport(&self) -> bool {
        matches!(self, RemoteError::Transport(_))
    }
}

impl From<reqwest::Error> for RemoteError {
    fn from(err: reqwest::Error) -> Self {
        RemoteError::Transport(err.to_string())
    }
}

/// Errors emitted by the run coordinator.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RunError {
    #[error("could not start attempt: {0}")]
    StartFailed(#[source] RemoteError),
    #[error("a run has already been started")]
    AlreadyStarted,
    #[error("no active attempt")]
    NoActiveAttempt,
    #[error("no held submission to retry")]
    NothingToRetry,
    #[error(transparent)]
    State(#[from] SessionStateError),
}

/// Errors emitted while reading configuration.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("invalid base url {raw}: {source}")]
    InvalidBaseUrl {
        raw: String,
        #[source]
        source: url::ParseError,
    },
    #[error("could not build http client: {0}")]
    Client(#[from] reqwest::Error),
}
