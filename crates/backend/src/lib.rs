#![forbid(unsafe_code)]

pub mod api;
pub mod error;
pub mod http;
pub mod memory;
pub mod wire;

pub use api::{ExamBackend, ProgressSnapshot, StartedExam, Submission, SubmissionReceipt};
pub use error::BackendError;
pub use http::{HttpBackend, HttpBackendConfig};
pub use memory::{BackendCall, InMemoryBackend};
