use std::env;
use std::str::FromStr;
use std::time::Duration;

use quiz_core::duration::DEFAULT_RUN_SECS;
use quiz_core::model::DEFAULT_DIFFICULTY;
use url::Url;

use crate::error::ConfigError;

const DEFAULT_BASE_URL: &str = "http://127.0.0.1:5000/quiz/api/";

/// Where and how to reach the scoring authority.
#[derive(Clone, Debug)]
pub struct BackendConfig {
    pub base_url: Url,
    /// Raw `Cookie` header for a logged-in server session.
    pub session_cookie: Option<String>,
    pub timeout: Duration,
}

impl BackendConfig {
    /// Build a config for `base_url`. A trailing slash is added so endpoint
    /// names join below the given path.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidBaseUrl` if the url does not parse.
    pub fn new(base_url: &str) -> Result<Self, ConfigError> {
        let normalized = if base_url.ends_with('/') {
            base_url.to_owned()
        } else {
            format!("{base_url}/")
        };
        let base_url = Url::parse(&normalized).map_err(|source| ConfigError::InvalidBaseUrl {
            raw: base_url.to_owned(),
            source,
        })?;
        Ok(Self {
            base_url,
            session_cookie: None,
            timeout: Duration::from_secs(15),
        })
    }

    /// Read `QUIZ_BASE_URL`, `QUIZ_SESSION_COOKIE` and `QUIZ_HTTP_TIMEOUT_SECS`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidBaseUrl` if `QUIZ_BASE_URL` does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        let base = env::var("QUIZ_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.into());
        let mut config = Self::new(&base)?;
        config.session_cookie = env::var("QUIZ_SESSION_COOKIE")
            .ok()
            .filter(|v| !v.trim().is_empty());
        if let Some(secs) = env_parse::<u64>("QUIZ_HTTP_TIMEOUT_SECS") {
            config.timeout = Duration::from_secs(secs);
        }
        Ok(config)
    }

    #[must_use]
    pub fn with_session_cookie(mut self, cookie: impl Into<String>) -> Self {
        self.session_cookie = Some(cookie.into());
        self
    }
}

/// What to do when `submit_answer` fails.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum SubmitErrorPolicy {
    /// Abandon the run and finish.
    #[default]
    Finish,
    /// Stay on the question; the caller may retry the same submission.
    Hold,
}

impl FromStr for SubmitErrorPolicy {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "finish" => Ok(Self::Finish),
            "hold" => Ok(Self::Hold),
            _ => Err(()),
        }
    }
}

/// Pacing and defaults for one run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunConfig {
    /// Driver tick granularity.
    pub tick: Duration,
    /// Pause after the correctness notice before fetching the next question.
    pub feedback_delay: Duration,
    /// Pause after a `finished` signal before ending the attempt.
    pub finish_delay: Duration,
    /// Display time for a fetch error before ending the attempt.
    pub error_delay: Duration,
    pub default_run_secs: i64,
    pub initial_difficulty: i32,
    pub on_submit_error: SubmitErrorPolicy,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            tick: Duration::from_millis(100),
            feedback_delay: Duration::from_millis(450),
            finish_delay: Duration::from_millis(600),
            error_delay: Duration::from_millis(1500),
            default_run_secs: DEFAULT_RUN_SECS,
            initial_difficulty: DEFAULT_DIFFICULTY,
            on_submit_error: SubmitErrorPolicy::Finish,
        }
    }
}

impl RunConfig {
    /// Defaults overridden by `QUIZ_*` environment variables.
    ///
    /// Unparsable values are ignored.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(ms) = env_parse::<u64>("QUIZ_TICK_MS").filter(|ms| *ms > 0) {
            config.tick = Duration::from_millis(ms);
        }
        if let Some(ms) = env_parse::<u64>("QUIZ_FEEDBACK_DELAY_MS") {
            config.feedback_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = env_parse::<u64>("QUIZ_FINISH_DELAY_MS") {
            config.finish_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = env_parse::<u64>("QUIZ_ERROR_DELAY_MS") {
            config.error_delay = Duration::from_millis(ms);
        }
        if let Some(secs) = env_parse::<i64>("QUIZ_DEFAULT_RUN_SECS").filter(|s| *s > 0) {
            config.default_run_secs = secs;
        }
        if let Some(diff) = env_parse::<i32>("QUIZ_INITIAL_DIFFICULTY") {
            config.initial_difficulty = diff;
        }
        if let Some(policy) = env_parse::<SubmitErrorPolicy>("QUIZ_ON_SUBMIT_ERROR") {
            config.on_submit_error = policy;
        }
        config
    }

    /// No pauses between steps; used by tests and scripted runs.
    #[must_use]
    pub fn immediate() -> Self {
        Self {
            feedback_delay: Duration::ZERO,
            finish_delay: Duration::ZERO,
            error_delay: Duration::ZERO,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_submit_error_policy(mut self, policy: SubmitErrorPolicy) -> Self {
        self.on_submit_error = policy;
        self
    }
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|raw| raw.trim().parse().ok())
}
