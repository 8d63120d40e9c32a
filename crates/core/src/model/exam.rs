use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::cursor::Cursor;
use crate::model::ids::{ExamId, QuestionId};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ExamError {
    #[error("exam has no questions")]
    NoQuestions,

    #[error("question id {0} appears more than once")]
    DuplicateQuestion(QuestionId),
}

//
// ─── QUESTIONS ─────────────────────────────────────────────────────────────────
//

/// The answer shape a question expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionKind {
    #[serde(alias = "multiple-choice", alias = "MULTIPLE_CHOICE")]
    MultipleChoice,
    #[serde(alias = "true-false", alias = "TRUE_FALSE")]
    TrueFalse,
    #[serde(alias = "short-answer", alias = "SHORT_ANSWER")]
    ShortAnswer,
    #[serde(alias = "ESSAY")]
    Essay,
}

impl QuestionKind {
    /// Whether answers for this kind are free text.
    #[must_use]
    pub fn is_text(self) -> bool {
        matches!(self, Self::ShortAnswer | Self::Essay)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    id: QuestionId,
    kind: QuestionKind,
    points: u32,
    prompt: String,
    options: Vec<String>,
}

impl Question {
    #[must_use]
    pub fn new(id: QuestionId, kind: QuestionKind, points: u32) -> Self {
        Self {
            id,
            kind,
            points,
            prompt: String::new(),
            options: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = prompt.into();
        self
    }

    #[must_use]
    pub fn with_options<I, S>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options = options.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn id(&self) -> QuestionId {
        self.id
    }

    #[must_use]
    pub fn kind(&self) -> QuestionKind {
        self.kind
    }

    #[must_use]
    pub fn points(&self) -> u32 {
        self.points
    }

    #[must_use]
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    #[must_use]
    pub fn options(&self) -> &[String] {
        &self.options
    }
}

/// An ordered group of questions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    title: String,
    questions: Vec<Question>,
}

impl Section {
    #[must_use]
    pub fn new(title: impl Into<String>, questions: Vec<Question>) -> Self {
        Self {
            title: title.into(),
            questions,
        }
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.questions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }
}

//
// ─── EXAM ──────────────────────────────────────────────────────────────────────
//

/// Read-only structure of an exam: ordered sections of ordered questions.
///
/// Question ids are unique across the whole exam and at least one question exists.
/// Sections may be empty; navigation skips them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExamDefinition {
    id: ExamId,
    title: String,
    duration_minutes: u32,
    sections: Vec<Section>,
}

impl ExamDefinition {
    /// Build a validated exam definition.
    ///
    /// # Errors
    ///
    /// Returns `ExamError::DuplicateQuestion` if a question id repeats, or
    /// `ExamError::NoQuestions` if no section holds a question.
    pub fn new(
        id: ExamId,
        title: impl Into<String>,
        duration_minutes: u32,
        sections: Vec<Section>,
    ) -> Result<Self, ExamError> {
        let mut seen = HashSet::new();
        for question in sections.iter().flat_map(|s| s.questions.iter()) {
            if !seen.insert(question.id) {
                return Err(ExamError::DuplicateQuestion(question.id));
            }
        }
        if seen.is_empty() {
            return Err(ExamError::NoQuestions);
        }

        Ok(Self {
            id,
            title: title.into(),
            duration_minutes,
            sections,
        })
    }

    #[must_use]
    pub fn id(&self) -> ExamId {
        self.id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn duration_minutes(&self) -> u32 {
        self.duration_minutes
    }

    /// Allotted time in whole seconds.
    #[must_use]
    pub fn duration_seconds(&self) -> u64 {
        u64::from(self.duration_minutes) * 60
    }

    #[must_use]
    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    #[must_use]
    pub fn section_len(&self, section_index: usize) -> Option<usize> {
        self.sections.get(section_index).map(Section::len)
    }

    /// Total number of questions across all sections.
    #[must_use]
    pub fn total_questions(&self) -> usize {
        self.sections.iter().map(Section::len).sum()
    }

    #[must_use]
    pub fn total_points(&self) -> u32 {
        self.questions().map(Question::points).sum()
    }

    /// Iterate questions in exam order.
    pub fn questions(&self) -> impl Iterator<Item = &Question> {
        self.sections.iter().flat_map(|s| s.questions.iter())
    }

    #[must_use]
    pub fn question(&self, id: QuestionId) -> Option<&Question> {
        self.questions().find(|q| q.id == id)
    }

    #[must_use]
    pub fn question_at(&self, cursor: Cursor) -> Option<&Question> {
        self.sections
            .get(cursor.section_index())?
            .questions
            .get(cursor.question_index())
    }

    /// Locate a question by id.
    #[must_use]
    pub fn position_of(&self, id: QuestionId) -> Option<Cursor> {
        self.sections.iter().enumerate().find_map(|(s, section)| {
            section
                .questions
                .iter()
                .position(|q| q.id == id)
                .map(|q| Cursor::new(s, q))
        })
    }
}
