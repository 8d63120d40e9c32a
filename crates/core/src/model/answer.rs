use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::model::exam::{Question, QuestionKind};
use crate::model::ids::QuestionId;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum AnswerError {
    #[error("question {0} does not belong to this exam")]
    UnknownQuestion(QuestionId),

    #[error("answer for question {question} does not fit a {kind:?} question")]
    KindMismatch {
        question: QuestionId,
        kind: QuestionKind,
    },

    #[error("option {index} is out of range for question {question}")]
    OptionOutOfRange { question: QuestionId, index: u32 },
}

/// A typed answer.
///
/// On the wire the value is untagged: a number for multiple choice, a boolean for
/// true/false, and a string for written answers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnswerValue {
    Choice(u32),
    TrueFalse(bool),
    Text(String),
}

impl AnswerValue {
    /// Whether this value fits the given question kind.
    #[must_use]
    pub fn fits(&self, kind: QuestionKind) -> bool {
        match self {
            Self::Choice(_) => kind == QuestionKind::MultipleChoice,
            Self::TrueFalse(_) => kind == QuestionKind::TrueFalse,
            Self::Text(_) => kind.is_text(),
        }
    }

    /// Blank text counts as unanswered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Text(text) => text.trim().is_empty(),
            Self::Choice(_) | Self::TrueFalse(_) => false,
        }
    }

    /// Check a typed value against its question.
    ///
    /// # Errors
    ///
    /// Returns `AnswerError::KindMismatch` when the variant does not fit the question kind,
    /// or `AnswerError::OptionOutOfRange` for a choice past the listed options.
    pub fn check(self, question: &Question) -> Result<Self, AnswerError> {
        if !self.fits(question.kind()) {
            return Err(AnswerError::KindMismatch {
                question: question.id(),
                kind: question.kind(),
            });
        }
        if let Self::Choice(index) = self {
            let options = question.options().len();
            if options > 0 && index as usize >= options {
                return Err(AnswerError::OptionOutOfRange {
                    question: question.id(),
                    index,
                });
            }
        }
        Ok(self)
    }

    /// Decode a raw JSON value (a saved answer or typed input) for a question.
    ///
    /// Numbers and booleans are also accepted in their string spelling.
    ///
    /// # Errors
    ///
    /// Returns `AnswerError` if the raw value cannot represent an answer to the question.
    pub fn resolve(question: &Question, raw: &Value) -> Result<Self, AnswerError> {
        let mismatch = || AnswerError::KindMismatch {
            question: question.id(),
            kind: question.kind(),
        };

        let value = match question.kind() {
            QuestionKind::MultipleChoice => {
                let index = match raw {
                    Value::Number(n) => n.as_u64(),
                    Value::String(s) => s.trim().parse::<u64>().ok(),
                    _ => None,
                }
                .and_then(|n| u32::try_from(n).ok())
                .ok_or_else(mismatch)?;
                Self::Choice(index)
            }
            QuestionKind::TrueFalse => {
                let flag = match raw {
                    Value::Bool(b) => Some(*b),
                    Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                        "true" | "t" | "yes" => Some(true),
                        "false" | "f" | "no" => Some(false),
                        _ => None,
                    },
                    _ => None,
                }
                .ok_or_else(mismatch)?;
                Self::TrueFalse(flag)
            }
            QuestionKind::ShortAnswer | QuestionKind::Essay => match raw {
                Value::String(s) => Self::Text(s.clone()),
                _ => return Err(mismatch()),
            },
        };

        value.check(question)
    }
}
