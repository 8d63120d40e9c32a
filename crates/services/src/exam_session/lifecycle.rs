use backend::{BackendError, SubmissionReceipt};
use serde::Serialize;

use crate::error::SessionError;

/// Where the attempt is in its lifecycle.
///
/// `Idle → Starting → Active → Submitting → Submitted`, with `Failed` for a start that
/// did not produce a session and `SubmitFailed` for a submission waiting on a retry.
/// `SubmitFailed` never returns to `Active`. `Unmounted` is reached from any phase once
/// the engine has stopped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    #[default]
    Idle,
    Starting,
    Active,
    Submitting,
    SubmitFailed,
    Submitted,
    Failed,
    Unmounted,
}

impl SessionPhase {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Submitted | Self::Failed | Self::Unmounted)
    }

    /// Only an active attempt takes answers, navigation and saves.
    #[must_use]
    pub fn accepts_input(self) -> bool {
        self == Self::Active
    }
}

/// Why the attempt was submitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmitReason {
    Manual,
    Expired,
}

/// Lifecycle transitions. Each method returns `false` and changes nothing when the
/// transition is not valid from the current phase.
#[derive(Debug, Clone)]
pub(crate) struct Lifecycle {
    phase: SessionPhase,
    error: Option<SessionError>,
    reason: Option<SubmitReason>,
    receipt: Option<SubmissionReceipt>,
}

impl Lifecycle {
    pub(crate) fn new() -> Self {
        Self {
            phase: SessionPhase::Idle,
            error: None,
            reason: None,
            receipt: None,
        }
    }

    pub(crate) fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub(crate) fn error(&self) -> Option<&SessionError> {
        self.error.as_ref()
    }

    pub(crate) fn reason(&self) -> Option<SubmitReason> {
        self.reason
    }

    pub(crate) fn receipt(&self) -> Option<&SubmissionReceipt> {
        self.receipt.as_ref()
    }

    /// `Idle | Failed → Starting`. A start while one is running is ignored.
    pub(crate) fn begin_start(&mut self) -> bool {
        if !matches!(self.phase, SessionPhase::Idle | SessionPhase::Failed) {
            return false;
        }
        self.phase = SessionPhase::Starting;
        self.error = None;
        true
    }

    pub(crate) fn activate(&mut self) -> bool {
        self.transition(SessionPhase::Starting, SessionPhase::Active)
    }

    pub(crate) fn fail_start(&mut self, error: BackendError) -> bool {
        if !self.transition(SessionPhase::Starting, SessionPhase::Failed) {
            return false;
        }
        self.error = Some(SessionError::StartFailed(error));
        true
    }

    pub(crate) fn begin_submit(&mut self, reason: SubmitReason) -> bool {
        if !self.transition(SessionPhase::Active, SessionPhase::Submitting) {
            return false;
        }
        self.reason = Some(reason);
        true
    }

    pub(crate) fn submit_failed(&mut self, error: BackendError) -> bool {
        if !self.transition(SessionPhase::Submitting, SessionPhase::SubmitFailed) {
            return false;
        }
        self.error = Some(SessionError::SubmitFailed(error));
        true
    }

    pub(crate) fn retry_submit(&mut self) -> bool {
        if !self.transition(SessionPhase::SubmitFailed, SessionPhase::Submitting) {
            return false;
        }
        self.error = None;
        true
    }

    pub(crate) fn submitted(&mut self, receipt: SubmissionReceipt) -> bool {
        if !self.transition(SessionPhase::Submitting, SessionPhase::Submitted) {
            return false;
        }
        self.receipt = Some(receipt);
        true
    }

    /// Final transition; the engine no longer takes commands.
    pub(crate) fn unmount(&mut self) {
        self.phase = SessionPhase::Unmounted;
    }

    fn transition(&mut self, from: SessionPhase, to: SessionPhase) -> bool {
        if self.phase != from {
            return false;
        }
        self.phase = to;
        true
    }
}
