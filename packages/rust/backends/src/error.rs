//! Errors from generative-text backends.

use llmstxt_shared::LlmsTxtError;

/// A failed backend call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    /// The call exceeded its per-call timeout.
    #[error("request timed out")]
    Timeout,

    /// The provider rejected the call with HTTP 429.
    #[error("rate limited by provider")]
    RateLimited,

    /// The provider returned a 5xx status.
    #[error("server error (HTTP {status}): {message}")]
    Server { status: u16, message: String },

    /// The provider returned a non-retryable 4xx status.
    #[error("request rejected (HTTP {status}): {message}")]
    Client { status: u16, message: String },

    /// Connection-level failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// The response could not be understood.
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl BackendError {
    /// Whether retrying the same call may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Timeout | Self::RateLimited | Self::Server { .. } | Self::Transport(_)
        )
    }

    /// Map an HTTP status and response body to an error.
    pub fn from_status(status: u16, body: &str) -> Self {
        let message: String = body.trim().chars().take(300).collect();
        match status {
            429 => Self::RateLimited,
            500..=599 => Self::Server { status, message },
            _ => Self::Client { status, message },
        }
    }

    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::Malformed(msg.into())
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else if e.is_decode() {
            Self::Malformed(e.to_string())
        } else {
            Self::Transport(e.to_string())
        }
    }
}

impl From<BackendError> for LlmsTxtError {
    fn from(e: BackendError) -> Self {
        LlmsTxtError::Backend(e.to_string())
    }
}
