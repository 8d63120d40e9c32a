#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod exam_session;
pub mod save;

pub use exam_core::Clock;

pub use config::EngineConfig;
pub use error::{SaveFailure, SessionError};
pub use exam_session::{
    ExamSessionEngine, ExamSessionHandle, ExamSessionView, PaletteEntry, QuestionPosition,
    QuestionView, SessionPhase, SubmitReason, SubmitSummary,
};
pub use save::{RetryPolicy, SaveBanner, SaveCoordinator, SaveMode, SaveState, SaveStatus, SaveTrigger};
