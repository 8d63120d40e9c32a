use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Bounded exponential backoff for save retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// `max_attempts` counts the first try; it is at least one.
    #[must_use]
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    #[must_use]
    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    /// Delay after the `attempt`-th failed attempt (1-based): `base × 2^(attempt - 1)`.
    #[must_use]
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(1_u32 << exponent)
    }

    /// Whether another attempt follows the `attempt`-th failure.
    #[must_use]
    pub fn allows_retry_after(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}

/// What asked for a save.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SaveTrigger {
    Periodic,
    OnChange,
    Manual,
}

impl fmt::Display for SaveTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Periodic => "periodic",
            Self::OnChange => "on_change",
            Self::Manual => "manual",
        };
        f.write_str(label)
    }
}

/// Background saves fail quietly; a save the student retried reports every attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveMode {
    Silent,
    Escalated,
}

/// Save health banner shown to the student.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SaveBanner {
    #[default]
    Hidden,
    /// Non-blocking "could not save, attempt N" notice.
    Retrying { attempt: u32, max_attempts: u32 },
    /// Retries ran out; stays until a later save succeeds.
    Failed { message: String },
    /// The backend refused the save; autosave is paused until the student retries.
    Rejected { message: String },
}

impl SaveBanner {
    #[must_use]
    pub fn is_visible(&self) -> bool {
        !matches!(self, Self::Hidden)
    }
}

/// Transient save status, rebuilt on each attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SaveState {
    pub last_error: Option<String>,
    pub pending_retry: u32,
    pub in_flight: bool,
}

/// Everything the UI needs about autosave.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SaveStatus {
    pub state: SaveState,
    pub banner: SaveBanner,
    pub last_saved_at: Option<DateTime<Utc>>,
}
