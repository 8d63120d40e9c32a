use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use exam_core::model::{AnswerMap, ExamDefinition, ExamId, QuestionId, Session, SessionId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::BackendError;

/// Result of starting (or re-entering) an exam attempt.
///
/// `saved_answers` holds raw values from an earlier autosave; they are decoded against
/// the question kinds by the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct StartedExam {
    pub session: Session,
    pub exam: ExamDefinition,
    pub saved_answers: BTreeMap<QuestionId, Value>,
    pub current_question_index: Option<usize>,
}

/// Full progress snapshot sent by autosave. Last write wins on the server.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSnapshot {
    pub answers: AnswerMap,
    pub current_question_index: usize,
    pub time_remaining: u64,
}

/// Final submission payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub session_id: SessionId,
    pub answers: AnswerMap,
    pub submitted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionReceipt {
    pub id: String,
    pub submitted_at: DateTime<Utc>,
    #[serde(default)]
    pub score: Option<f64>,
}

/// Backend operations the exam session depends on.
#[async_trait]
pub trait ExamBackend: Send + Sync {
    /// Create or re-enter the student's attempt for an exam.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::NotFound`, `Forbidden` or `Conflict` (an attempt is already
    /// active elsewhere), or transport failures.
    async fn start_exam(&self, exam_id: ExamId) -> Result<StartedExam, BackendError>;

    /// Store in-progress answers. Idempotent; stale `time_remaining` is accepted.
    ///
    /// # Errors
    ///
    /// Returns `BackendError` when the save is rejected or the request fails.
    async fn save_progress(
        &self,
        exam_id: ExamId,
        session_id: SessionId,
        progress: &ProgressSnapshot,
    ) -> Result<(), BackendError>;

    /// Submit the attempt. Called at most once per session by the engine.
    ///
    /// # Errors
    ///
    /// Returns `BackendError` when the submission is rejected or the request fails.
    async fn submit_exam(
        &self,
        exam_id: ExamId,
        submission: &Submission,
    ) -> Result<SubmissionReceipt, BackendError>;
}
