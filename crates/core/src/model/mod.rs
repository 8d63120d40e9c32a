mod answer;
mod answers;
mod cursor;
mod exam;
mod ids;
mod session;

pub use answer::{AnswerError, AnswerValue};
pub use answers::{AnswerMap, AnswerStore, FlagSet};
pub use cursor::{Cursor, CursorError};
pub use exam::{ExamDefinition, ExamError, Question, QuestionKind, Section};
pub use ids::{ExamId, ParseIdError, QuestionId, SessionId, StudentId};
pub use session::{Session, SessionRecordError};
