use thiserror::Error;

use crate::model::{AnswerError, CursorError, ExamError, SessionRecordError};

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Exam(#[from] ExamError),
    #[error(transparent)]
    Session(#[from] SessionRecordError),
    #[error(transparent)]
    Answer(#[from] AnswerError),
    #[error(transparent)]
    Cursor(#[from] CursorError),
}
