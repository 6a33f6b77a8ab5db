use async_trait::async_trait;
use reqwest::header::COOKIE;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use serde_json::{Map, Value};

use quiz_core::model::{AnswerSubmission, AttemptId, LastOutcome, Mode, Outcome, StateSnapshot};

use crate::config::BackendConfig;
use crate::error::{ConfigError, RemoteError};
use crate::protocol::{
    self, EndReply, EndRequest, QuestionReply, QuestionRequest, StartRequest, SubmitRequest,
    WireLastOutcome, WireState,
};

/// Request/response contract of the remote scoring authority.
///
/// Every failure, whatever its origin, is reported as a `RemoteError`.
#[async_trait]
pub trait QuizBackend: Send + Sync {
    /// Open a new attempt.
    ///
    /// # Errors
    ///
    /// Returns `RemoteError` for transport, protocol or explicit server errors.
    async fn start(
        &self,
        mode: Mode,
        params: Map<String, Value>,
    ) -> Result<AttemptId, RemoteError>;

    /// Ask for the next question.
    ///
    /// # Errors
    ///
    /// Returns `RemoteError` for transport, protocol or explicit server errors.
    async fn get_question(
        &self,
        mode: Mode,
        attempt_id: &AttemptId,
        last_outcome: Option<&LastOutcome>,
        state: &StateSnapshot,
    ) -> Result<QuestionReply, RemoteError>;

    /// Report an answer and receive the verdict.
    ///
    /// # Errors
    ///
    /// Returns `RemoteError` for transport, protocol or explicit server errors.
    async fn submit_answer(&self, submission: &AnswerSubmission) -> Result<Outcome, RemoteError>;

    /// Close the attempt.
    ///
    /// # Errors
    ///
    /// Returns `RemoteError` for transport, protocol or explicit server errors.
    async fn end(&self, attempt_id: &AttemptId) -> Result<EndReply, RemoteError>;
}

/// Normalize a raw HTTP reply into a JSON body or a `RemoteError`.
///
/// Non-2xx statuses are errors even when a body is present. An unparsable
/// body reads as `{"error": <raw text or "Invalid JSON">}`.
///
/// # Errors
///
/// Returns `RemoteError::Status` for non-2xx replies, `RemoteError::InvalidBody`
/// for unparsable 2xx bodies and `RemoteError::Server` for an explicit `error`.
pub fn interpret_response(status: StatusCode, text: &str) -> Result<Value, RemoteError> {
    let parsed = serde_json::from_str::<Value>(text);

    if !status.is_success() {
        let message = match &parsed {
            Ok(body) => protocol::error_field(body),
            Err(_) => Some(unparsable_message(text)),
        }
        .unwrap_or_else(|| format!("HTTP {}", status.as_u16()));
        return Err(RemoteError::Status {
            status: status.as_u16(),
            message,
        });
    }

    let body = parsed.map_err(|_| RemoteError::InvalidBody(unparsable_message(text)))?;
    if let Some(message) = protocol::error_field(&body) {
        return Err(RemoteError::Server(message));
    }
    Ok(body)
}

fn unparsable_message(text: &str) -> String {
    if text.trim().is_empty() {
        "Invalid JSON".to_owned()
    } else {
        text.to_owned()
    }
}

//
// ─── HTTP BACKEND ──────────────────────────────────────────────────────────────
//

/// `QuizBackend` over JSON POST requests.
#[derive(Clone)]
pub struct HttpQuizBackend {
    client: Client,
    config: BackendConfig,
}

impl HttpQuizBackend {
    /// # Errors
    ///
    /// Returns `ConfigError::Client` if the HTTP client cannot be built.
    pub fn new(config: BackendConfig) -> Result<Self, ConfigError> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }

    /// # Errors
    ///
    /// Returns `ConfigError` for a bad `QUIZ_BASE_URL` or client build failure.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::new(BackendConfig::from_env()?)
    }

    #[must_use]
    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    async fn post<B: Serialize + Sync>(&self, endpoint: &str, body: &B) -> Result<Value, RemoteError> {
        let url = self
            .config
            .base_url
            .join(endpoint)
            .map_err(|e| RemoteError::Transport(format!("bad endpoint {endpoint}: {e}")))?;

        let mut request = self.client.post(url).json(body);
        if let Some(cookie) = &self.config.session_cookie {
            request = request.header(COOKIE, cookie);
        }

        let result = async {
            let response = request.send().await?;
            let status = response.status();
            let text = response.text().await?;
            interpret_response(status, &text)
        }
        .await;

        if let Err(err) = &result {
            tracing::warn!(endpoint, error = %err, "remote call failed");
        }
        result
    }
}

#[async_trait]
impl QuizBackend for HttpQuizBackend {
    async fn start(
        &self,
        mode: Mode,
        params: Map<String, Value>,
    ) -> Result<AttemptId, RemoteError> {
        let body = self
            .post(protocol::START_ATTEMPT, &StartRequest { mode, params })
            .await?;
        protocol::parse_start(body)
    }

    async fn get_question(
        &self,
        mode: Mode,
        attempt_id: &AttemptId,
        last_outcome: Option<&LastOutcome>,
        state: &StateSnapshot,
    ) -> Result<QuestionReply, RemoteError> {
        let request = QuestionRequest {
            mode,
            attempt_id,
            last_outcome: last_outcome.map(WireLastOutcome::from),
            state: WireState::from(state),
        };
        let body = self.post(protocol::GET_QUESTION, &request).await?;
        protocol::parse_question(body)
    }

    async fn submit_answer(&self, submission: &AnswerSubmission) -> Result<Outcome, RemoteError> {
        let body = self
            .post(protocol::SUBMIT_ANSWER, &SubmitRequest::from(submission))
            .await?;
        protocol::parse_outcome(body)
    }

    async fn end(&self, attempt_id: &AttemptId) -> Result<EndReply, RemoteError> {
        let body = self
            .post(protocol::END_ATTEMPT, &EndRequest { attempt_id })
            .await?;
        protocol::parse_end(body)
    }
}
