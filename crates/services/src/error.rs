//! Shared error types for the services crate.

use backend::BackendError;
use thiserror::Error;

/// Outcome of a save job that gave up.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SaveFailure {
    /// Transient failures that outlasted the retry budget.
    #[error("could not save after {attempts} attempts: {error}")]
    Retryable { attempts: u32, error: BackendError },

    /// The backend refused the save; retrying will not help.
    #[error("save rejected: {0}")]
    Fatal(BackendError),
}

impl SaveFailure {
    #[must_use]
    pub fn classify(error: BackendError, attempts: u32) -> Self {
        if error.is_retryable() {
            Self::Retryable { attempts, error }
        } else {
            Self::Fatal(error)
        }
    }
}

/// Errors emitted by the exam session.
///
/// Backend failures during start and submit are reported through the session view;
/// callers of the handle only ever see `EngineClosed`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionError {
    #[error("could not start exam: {0}")]
    StartFailed(BackendError),
    #[error("could not submit exam: {0}")]
    SubmitFailed(BackendError),
    #[error("exam session has shut down")]
    EngineClosed,
}
