//! JSON shapes returned by the exam API.
//!
//! These mirror the server payloads so that domain types in `exam_core` stay free of
//! transport concerns. Conversion validates through the domain constructors.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use exam_core::model::{
    ExamDefinition, ExamId, Question, QuestionId, QuestionKind, Section, Session, SessionId,
    StudentId,
};
use serde::Deserialize;
use serde_json::Value;

use crate::api::StartedExam;

#[derive(Debug, Clone, Deserialize)]
pub struct StartExamResponse {
    pub session: SessionDto,
    pub exam: ExamDto,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionDto {
    pub id: SessionId,
    pub exam_id: ExamId,
    pub student_id: StudentId,
    pub started_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    #[serde(default)]
    pub time_remaining: Option<u64>,
    #[serde(default)]
    pub answers: BTreeMap<QuestionId, Value>,
    #[serde(default)]
    pub current_question_index: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExamDto {
    pub id: ExamId,
    #[serde(default)]
    pub title: String,
    /// Minutes.
    pub duration: u32,
    pub sections: Vec<SectionDto>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SectionDto {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub questions: Vec<QuestionDto>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QuestionDto {
    pub id: QuestionId,
    #[serde(rename = "type")]
    pub kind: QuestionKind,
    #[serde(default)]
    pub points: u32,
    #[serde(default, alias = "text", alias = "question")]
    pub prompt: String,
    #[serde(default)]
    pub options: Vec<String>,
}

impl QuestionDto {
    fn into_question(self) -> Question {
        Question::new(self.id, self.kind, self.points)
            .with_prompt(self.prompt)
            .with_options(self.options)
    }
}

impl ExamDto {
    /// Convert into a validated exam definition.
    ///
    /// # Errors
    ///
    /// Returns `exam_core::Error::Exam` if question ids repeat or the exam is empty.
    pub fn into_exam(self) -> Result<ExamDefinition, exam_core::Error> {
        let sections = self
            .sections
            .into_iter()
            .map(|s| {
                Section::new(
                    s.title,
                    s.questions.into_iter().map(QuestionDto::into_question).collect(),
                )
            })
            .collect();
        Ok(ExamDefinition::new(
            self.id,
            self.title,
            self.duration,
            sections,
        )?)
    }
}

impl StartExamResponse {
    /// Convert the payload into domain types.
    ///
    /// # Errors
    ///
    /// Returns `exam_core::Error` when the exam or session fails validation, or when the
    /// session points at a different exam.
    pub fn into_started(self) -> Result<StartedExam, exam_core::Error> {
        let exam = self.exam.into_exam()?;
        let dto = self.session;
        let session = Session::new(
            dto.id,
            dto.exam_id,
            dto.student_id,
            dto.started_at,
            dto.expires_at,
            dto.time_remaining,
        )?;
        session.ensure_exam(&exam)?;

        Ok(StartedExam {
            session,
            exam,
            saved_answers: dto.answers,
            current_question_index: dto.current_question_index,
        })
    }
}
