//! Error types for the quiz core. `OracleError` is shared with the oracle
//! adapters.

use std::time::Duration;

use thiserror::Error;

use crate::model::SessionId;

/// Result type for core quiz operations.
pub type QuizResult<T> = Result<T, QuizError>;

/// Errors surfaced by the engine, sessions, the store, and the service.
#[derive(Debug, Error)]
pub enum QuizError {
    /// The operation is not valid in the session's current state: the quiz
    /// is already complete, the answered question is not the pending one,
    /// or another request holds the session.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// The session id is unknown or the session has expired.
    #[error("session not found: {0}")]
    NotFound(SessionId),

    /// The scoring oracle failed to produce a usable evaluation.
    #[error(transparent)]
    Oracle(#[from] OracleError),

    /// The question bank could not be loaded or is unusable.
    #[error("question bank: {0}")]
    Bank(String),
}

impl QuizError {
    pub(crate) fn invalid_state(msg: impl Into<String>) -> Self {
        QuizError::InvalidState(msg.into())
    }
}

/// Why an oracle could not be reached or refused to answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnavailableReason {
    /// Network failure, timeout, or a server-side error.
    Transient,
    /// The backend asked the caller to slow down.
    RateLimited { retry_after_ms: u64 },
    /// Credentials were rejected.
    AuthenticationFailed,
    /// The model or endpoint does not exist.
    NotFound,
}

/// Errors that can occur when asking an oracle to score an answer.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OracleError {
    /// The evaluation backend is unreachable, rejected the request, or timed out.
    #[error("oracle unavailable: {message}")]
    Unavailable {
        reason: UnavailableReason,
        message: String,
    },

    /// The backend answered, but the verdict was malformed or out of range.
    #[error("oracle returned an invalid response: {0}")]
    InvalidResponse(String),
}

impl OracleError {
    /// A transient `Unavailable` error.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::with_reason(UnavailableReason::Transient, message)
    }

    pub fn rate_limited(retry_after_ms: u64) -> Self {
        Self::with_reason(
            UnavailableReason::RateLimited { retry_after_ms },
            format!("rate limited, retry after {retry_after_ms}ms"),
        )
    }

    pub fn authentication_failed(message: impl Into<String>) -> Self {
        Self::with_reason(UnavailableReason::AuthenticationFailed, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::with_reason(UnavailableReason::NotFound, message)
    }

    pub fn with_reason(reason: UnavailableReason, message: impl Into<String>) -> Self {
        OracleError::Unavailable {
            reason,
            message: message.into(),
        }
    }

    /// The reason behind an `Unavailable` error, `None` for invalid responses.
    pub fn reason(&self) -> Option<UnavailableReason> {
        match self {
            OracleError::Unavailable { reason, .. } => Some(*reason),
            OracleError::InvalidResponse(_) => None,
        }
    }

    /// Returns `true` if this error is permanent and should not be retried.
    pub fn is_permanent(&self) -> bool {
        !self.is_retryable()
    }

    /// Returns `true` if retrying the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.reason(),
            Some(UnavailableReason::Transient | UnavailableReason::RateLimited { .. })
        )
    }

    /// The delay the backend asked for before the next attempt, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self.reason() {
            Some(UnavailableReason::RateLimited { retry_after_ms }) => {
                Some(Duration::from_millis(retry_after_ms))
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryability_follows_the_reason() {
        assert!(OracleError::unavailable("timeout").is_retryable());
        assert!(OracleError::rate_limited(1000).is_retryable());
        assert!(OracleError::authentication_failed("HTTP 401: invalid key").is_permanent());
        assert!(OracleError::not_found("no such model").is_permanent());
        assert!(OracleError::InvalidResponse("score 1.4".into()).is_permanent());
    }

    #[test]
    fn retry_after_comes_from_the_reason_not_the_message() {
        assert_eq!(
            OracleError::rate_limited(5000).retry_after(),
            Some(Duration::from_millis(5000))
        );
        let reworded = OracleError::with_reason(
            UnavailableReason::RateLimited {
                retry_after_ms: 250,
            },
            "slow down please",
        );
        assert_eq!(reworded.retry_after(), Some(Duration::from_millis(250)));
        assert_eq!(
            OracleError::unavailable("rate limited, retry after 1ms").retry_after(),
            None
        );
        assert_eq!(OracleError::InvalidResponse("x".into()).retry_after(), None);
    }

    #[test]
    fn oracle_error_converts_into_quiz_error() {
        let err: QuizError = OracleError::unavailable("down").into();
        assert!(matches!(
            err,
            QuizError::Oracle(OracleError::Unavailable {
                reason: UnavailableReason::Transient,
                ..
            })
        ));
        assert_eq!(err.to_string(), "oracle unavailable: down");
    }
}
