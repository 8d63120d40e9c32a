use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::SaveFailure;
use crate::save::job::{SaveEvent, SaveJob, SaveReport, SaveTarget};
use crate::save::policy::{RetryPolicy, SaveBanner, SaveMode, SaveState, SaveStatus, SaveTrigger};

struct RunningJob {
    id: u64,
    mode: SaveMode,
    handle: JoinHandle<()>,
}

/// Serializes autosave for one session.
///
/// At most one job runs at a time. A trigger that arrives while a job runs is folded
/// into a single deferred save; because every attempt reads the newest snapshot,
/// intermediate states are never queued individually.
pub struct SaveCoordinator {
    policy: RetryPolicy,
    target: Option<SaveTarget>,
    job: Option<RunningJob>,
    pending: Option<SaveTrigger>,
    next_job_id: u64,
    suspended: bool,
    state: SaveState,
    banner: SaveBanner,
    last_saved_at: Option<DateTime<Utc>>,
}

impl SaveCoordinator {
    #[must_use]
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            target: None,
            job: None,
            pending: None,
            next_job_id: 0,
            suspended: false,
            state: SaveState::default(),
            banner: SaveBanner::Hidden,
            last_saved_at: None,
        }
    }

    /// Start accepting triggers for a freshly activated session.
    pub(crate) fn bind(&mut self, target: SaveTarget) {
        self.shutdown();
        self.target = Some(target);
        self.suspended = false;
        self.state = SaveState::default();
        self.banner = SaveBanner::Hidden;
        self.last_saved_at = None;
    }

    #[must_use]
    pub fn is_in_flight(&self) -> bool {
        self.job.is_some()
    }

    #[must_use]
    pub fn status(&self) -> SaveStatus {
        SaveStatus {
            state: SaveState {
                in_flight: self.is_in_flight(),
                ..self.state.clone()
            },
            banner: self.banner.clone(),
            last_saved_at: self.last_saved_at,
        }
    }

    /// Background trigger (periodic or on-change).
    pub fn trigger(&mut self, trigger: SaveTrigger) {
        if self.target.is_none() {
            return;
        }
        if self.suspended {
            debug!(%trigger, "autosave paused after a rejected save");
            return;
        }
        if self.job.is_some() {
            debug!(%trigger, "save in flight, deferring");
            self.pending = Some(trigger);
            return;
        }
        self.spawn(SaveMode::Silent, trigger);
    }

    /// Student-initiated retry from the failure banner.
    ///
    /// A save already in flight is escalated instead of starting a second one, so its
    /// remaining attempts show up in the banner.
    pub fn retry(&mut self) {
        if self.target.is_none() {
            return;
        }
        self.suspended = false;
        if let Some(job) = self.job.as_mut() {
            debug!(job = job.id, "manual retry joins the running save");
            job.mode = SaveMode::Escalated;
            return;
        }
        self.spawn(SaveMode::Escalated, SaveTrigger::Manual);
    }

    pub(crate) fn on_report(&mut self, report: SaveReport, now: DateTime<Utc>) {
        let current = self.target.as_ref().map(|t| t.epoch);
        let Some(job) = self
            .job
            .as_ref()
            .filter(|job| job.id == report.job && current == Some(report.epoch))
        else {
            debug!(job = report.job, "dropping stale save report");
            return;
        };
        let mode = job.mode;

        match report.event {
            SaveEvent::Retrying { attempt, error, .. } => {
                self.state.pending_retry = attempt;
                self.state.last_error = Some(error.to_string());
                if mode == SaveMode::Escalated {
                    self.banner = SaveBanner::Retrying {
                        attempt,
                        max_attempts: self.policy.max_attempts(),
                    };
                }
            }
            SaveEvent::Saved { .. } => {
                self.job = None;
                self.state = SaveState::default();
                self.banner = SaveBanner::Hidden;
                self.last_saved_at = Some(now);
                if let Some(trigger) = self.pending.take() {
                    self.spawn(SaveMode::Silent, trigger);
                }
            }
            SaveEvent::Failed { failure } => {
                self.job = None;
                self.pending = None;
                self.state.pending_retry = 0;
                self.state.last_error = Some(failure.to_string());
                match failure {
                    SaveFailure::Retryable { attempts, .. } => {
                        warn!(attempts, "autosave gave up");
                        self.banner = SaveBanner::Failed {
                            message: format!(
                                "Your answers could not be saved after {attempts} attempts."
                            ),
                        };
                    }
                    SaveFailure::Fatal(error) => {
                        warn!(error = %error, "autosave rejected, pausing");
                        self.suspended = true;
                        self.banner = SaveBanner::Rejected {
                            message: format!("Your answers could not be saved: {error}."),
                        };
                    }
                }
            }
        }
    }

    /// Abort any running job and stop accepting triggers.
    ///
    /// Returns the aborted job so the caller can wait until it has fully stopped.
    pub(crate) fn shutdown(&mut self) -> Option<JoinHandle<()>> {
        self.target = None;
        self.pending = None;
        self.job.take().map(|job| {
            job.handle.abort();
            job.handle
        })
    }

    fn spawn(&mut self, mode: SaveMode, trigger: SaveTrigger) {
        let Some(target) = self.target.clone() else {
            return;
        };
        self.next_job_id += 1;
        let id = self.next_job_id;
        info!(job = id, %trigger, "saving progress");

        let job = SaveJob {
            target,
            policy: self.policy,
            id,
        };
        self.job = Some(RunningJob {
            id,
            mode,
            handle: tokio::spawn(job.run()),
        });
    }
}

impl Drop for SaveCoordinator {
    fn drop(&mut self) {
        if let Some(job) = self.job.take() {
            job.handle.abort();
        }
    }
}
