//! Backend failures and their retry classification.

use thiserror::Error;

/// Errors surfaced by exam backends.
///
/// Each error is classified exactly once through [`BackendError::is_retryable`]; callers
/// decide retry behaviour from that alone.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum BackendError {
    #[error("not found")]
    NotFound,

    #[error("unauthorized")]
    Unauthorized,

    #[error("forbidden")]
    Forbidden,

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("request failed with status {0}")]
    Status(u16),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("invalid response: {0}")]
    Decode(String),
}

impl BackendError {
    /// Map a non-success HTTP status to an error.
    #[must_use]
    pub fn from_status(status: u16, body: &str) -> Self {
        match status {
            401 => Self::Unauthorized,
            403 => Self::Forbidden,
            404 => Self::NotFound,
            409 => Self::Conflict(body.trim().to_owned()),
            other => Self::Status(other),
        }
    }

    /// Transient failures worth retrying: transport errors, 5xx, 408 and 429.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Status(code) => *code >= 500 || *code == 408 || *code == 429,
            Self::NotFound
            | Self::Unauthorized
            | Self::Forbidden
            | Self::Conflict(_)
            | Self::Decode(_) => false,
        }
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode(err.to_string())
        } else if let Some(status) = err.status() {
            Self::from_status(status.as_u16(), "")
        } else {
            Self::Transport(err.to_string())
        }
    }
}
