mod attempt;
mod engine;
mod handle;
mod lifecycle;
mod timers;
mod view;

// Public API of the exam session subsystem.
pub use engine::ExamSessionEngine;
pub use handle::ExamSessionHandle;
pub use lifecycle::{SessionPhase, SubmitReason};
pub use view::{ExamSessionView, PaletteEntry, QuestionPosition, QuestionView, SubmitSummary};
