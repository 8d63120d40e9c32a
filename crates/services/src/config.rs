use std::env;
use std::time::Duration;

use tracing::warn;

use crate::save::RetryPolicy;

/// Timing knobs for an exam session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    pub tick_interval: Duration,
    pub autosave_interval: Duration,
    pub debounce: Duration,
    pub retry: RetryPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(1),
            autosave_interval: Duration::from_secs(30),
            debounce: Duration::from_millis(500),
            retry: RetryPolicy::default(),
        }
    }
}

impl EngineConfig {
    /// Defaults overridden by `EXAM_AUTOSAVE_SECS`, `EXAM_DEBOUNCE_MS`,
    /// `EXAM_SAVE_MAX_ATTEMPTS` and `EXAM_SAVE_BACKOFF_MS`.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`EngineConfig::from_env`] with a custom variable source.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(secs) = positive(&lookup, "EXAM_AUTOSAVE_SECS") {
            config.autosave_interval = Duration::from_secs(secs);
        }
        if let Some(ms) = positive(&lookup, "EXAM_DEBOUNCE_MS") {
            config.debounce = Duration::from_millis(ms);
        }
        let max_attempts = positive(&lookup, "EXAM_SAVE_MAX_ATTEMPTS")
            .and_then(|n| u32::try_from(n).ok())
            .unwrap_or(config.retry.max_attempts());
        let base_delay = positive(&lookup, "EXAM_SAVE_BACKOFF_MS")
            .map_or(config.retry.base_delay(), Duration::from_millis);
        config.retry = RetryPolicy::new(max_attempts, base_delay);

        config
    }

    #[must_use]
    pub fn with_autosave_interval(mut self, interval: Duration) -> Self {
        self.autosave_interval = interval;
        self
    }

    #[must_use]
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    #[must_use]
    pub fn with_tick_interval(mut self, tick: Duration) -> Self {
        self.tick_interval = tick;
        self
    }
}

fn positive(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<u64> {
    let raw = lookup(key)?;
    match raw.trim().parse::<u64>() {
        Ok(value) if value > 0 => Some(value),
        _ => {
            warn!(key, value = %raw, "ignoring invalid setting");
            None
        }
    }
}
