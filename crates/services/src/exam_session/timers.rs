use tokio::time::{Instant, sleep_until};

use crate::config::EngineConfig;

/// Deadlines owned by an active session. Dropping the value cancels every timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SessionTimers {
    pub tick_at: Instant,
    pub autosave_at: Instant,
    pub debounce_at: Option<Instant>,
}

impl SessionTimers {
    pub(crate) fn arm(now: Instant, config: &EngineConfig) -> Self {
        Self {
            tick_at: now + config.tick_interval,
            autosave_at: now + config.autosave_interval,
            debounce_at: None,
        }
    }
}

/// Sleep until `deadline`, or forever when there is none.
pub(crate) async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
