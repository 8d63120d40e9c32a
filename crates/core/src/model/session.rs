use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::exam::ExamDefinition;
use crate::model::ids::{ExamId, SessionId, StudentId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionRecordError {
    #[error("expires_at is before started_at")]
    InvalidTimeRange,

    #[error("session belongs to exam {session} but the exam is {exam}")]
    ExamMismatch { session: ExamId, exam: ExamId },
}

/// Server-issued record of one exam attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    id: SessionId,
    exam_id: ExamId,
    student_id: StudentId,
    started_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    time_remaining_seconds: Option<u64>,
}

impl Session {
    /// Rehydrate a session from the backend's response.
    ///
    /// # Errors
    ///
    /// Returns `SessionRecordError::InvalidTimeRange` if `expires_at` precedes `started_at`.
    pub fn new(
        id: SessionId,
        exam_id: ExamId,
        student_id: StudentId,
        started_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
        time_remaining_seconds: Option<u64>,
    ) -> Result<Self, SessionRecordError> {
        if expires_at < started_at {
            return Err(SessionRecordError::InvalidTimeRange);
        }
        Ok(Self {
            id,
            exam_id,
            student_id,
            started_at,
            expires_at,
            time_remaining_seconds,
        })
    }

    #[must_use]
    pub fn id(&self) -> SessionId {
        self.id
    }

    #[must_use]
    pub fn exam_id(&self) -> ExamId {
        self.exam_id
    }

    #[must_use]
    pub fn student_id(&self) -> StudentId {
        self.student_id
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    #[must_use]
    pub fn time_remaining_seconds(&self) -> Option<u64> {
        self.time_remaining_seconds
    }

    /// Seconds the countdown starts from: the server's remaining time when given,
    /// otherwise the exam's full duration.
    #[must_use]
    pub fn initial_remaining_seconds(&self, exam: &ExamDefinition) -> u64 {
        self.time_remaining_seconds
            .unwrap_or_else(|| exam.duration_seconds())
    }

    /// Ensure the session and exam describe the same attempt.
    ///
    /// # Errors
    ///
    /// Returns `SessionRecordError::ExamMismatch` when the ids differ.
    pub fn ensure_exam(&self, exam: &ExamDefinition) -> Result<(), SessionRecordError> {
        if self.exam_id != exam.id() {
            return Err(SessionRecordError::ExamMismatch {
                session: self.exam_id,
                exam: exam.id(),
            });
        }
        Ok(())
    }
}
