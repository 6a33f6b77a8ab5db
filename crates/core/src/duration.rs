use thiserror::Error;

/// Default length of a fixed-duration run when the player gives no usable value.
pub const DEFAULT_RUN_SECS: i64 = 180;

/// Longest run the duration prompt accepts.
pub const MAX_RUN_SECS: i64 = 60 * 60;

/// Rejected player-supplied run duration. Always recovered locally.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum DurationError {
    #[error("no run duration was provided")]
    Missing,
    #[error("run duration must be positive, got {0}s")]
    NotPositive(i64),
    #[error("run duration {0}s exceeds the {MAX_RUN_SECS}s limit")]
    TooLong(i64),
}

/// Validate a duration in seconds as returned by the prompt.
///
/// # Errors
///
/// Returns `DurationError` for a missing, non-positive, or oversized value.
pub fn validate_run_secs(raw: Option<i64>) -> Result<i64, DurationError> {
    match raw {
        None => Err(DurationError::Missing),
        Some(secs) if secs <= 0 => Err(DurationError::NotPositive(secs)),
        Some(secs) if secs > MAX_RUN_SECS => Err(DurationError::TooLong(secs)),
        Some(secs) => Ok(secs),
    }
}

/// Resolve a prompt value to a usable duration, substituting `default_secs` on error.
///
/// The rejected input is returned alongside so callers can log it.
#[must_use]
pub fn resolve_run_secs(raw: Option<i64>, default_secs: i64) -> (i64, Option<DurationError>) {
    match validate_run_secs(raw) {
        Ok(secs) => (secs, None),
        Err(err) => (default_secs, Some(err)),
    }
}
