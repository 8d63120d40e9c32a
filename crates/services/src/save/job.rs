use std::sync::Arc;
use std::time::Duration;

use backend::{BackendError, ExamBackend, ProgressSnapshot};
use exam_core::model::{ExamId, SessionId};
use tokio::sync::{mpsc, watch};
use tracing::{debug, warn};

use crate::error::SaveFailure;
use crate::save::policy::RetryPolicy;

/// Progress of one save job, reported back to the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SaveEvent {
    Retrying {
        attempt: u32,
        delay: Duration,
        error: BackendError,
    },
    Saved {
        attempt: u32,
    },
    Failed {
        failure: SaveFailure,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SaveReport {
    pub epoch: u64,
    pub job: u64,
    pub event: SaveEvent,
}

/// Where a session's saves go.
#[derive(Clone)]
pub(crate) struct SaveTarget {
    pub backend: Arc<dyn ExamBackend>,
    pub exam_id: ExamId,
    pub session_id: SessionId,
    pub snapshots: watch::Receiver<ProgressSnapshot>,
    pub reports: mpsc::UnboundedSender<SaveReport>,
    pub epoch: u64,
}

/// One save with its retries, run as a task.
///
/// Each attempt reads the newest snapshot, so coalesced changes ride along with the retry.
pub(crate) struct SaveJob {
    pub target: SaveTarget,
    pub policy: RetryPolicy,
    pub id: u64,
}

impl SaveJob {
    pub(crate) async fn run(self) {
        let max_attempts = self.policy.max_attempts();
        for attempt in 1..=max_attempts {
            let snapshot = self.target.snapshots.borrow().clone();
            let result = self
                .target
                .backend
                .save_progress(self.target.exam_id, self.target.session_id, &snapshot)
                .await;

            match result {
                Ok(()) => {
                    debug!(job = self.id, attempt, "progress saved");
                    self.report(SaveEvent::Saved { attempt });
                    return;
                }
                Err(error) if error.is_retryable() && self.policy.allows_retry_after(attempt) => {
                    let delay = self.policy.delay_after(attempt);
                    warn!(
                        job = self.id,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "save failed, retrying"
                    );
                    self.report(SaveEvent::Retrying {
                        attempt,
                        delay,
                        error,
                    });
                    tokio::time::sleep(delay).await;
                }
                Err(error) => {
                    warn!(job = self.id, attempt, error = %error, "save failed");
                    self.report(SaveEvent::Failed {
                        failure: SaveFailure::classify(error, attempt),
                    });
                    return;
                }
            }
        }
    }

    fn report(&self, event: SaveEvent) {
        let report = SaveReport {
            epoch: self.target.epoch,
            job: self.id,
            event,
        };
        if self.target.reports.send(report).is_err() {
            debug!(job = self.id, "session gone, dropping save report");
        }
    }
}
