mod coordinator;
mod job;
mod policy;

pub use coordinator::SaveCoordinator;
pub use policy::{RetryPolicy, SaveBanner, SaveMode, SaveState, SaveStatus, SaveTrigger};

pub(crate) use job::{SaveReport, SaveTarget};
