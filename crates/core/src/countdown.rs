//! Whole-second countdown state.
//!
//! `Countdown` only counts; the services layer decides when a second has passed.
//! For a starting value `T`, exactly `T` calls to [`Countdown::tick`] return a new value
//! and [`Countdown::take_expiry`] then reports expiry exactly once.

/// A re-armable countdown that reports expiry once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Countdown {
    remaining: u64,
    expiry_reported: bool,
}

impl Countdown {
    #[must_use]
    pub fn new(seconds: u64) -> Self {
        Self {
            remaining: seconds,
            expiry_reported: false,
        }
    }

    #[must_use]
    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    /// Expiry has been reported; no further ticks should be scheduled.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.expiry_reported
    }

    /// Decrement by one second.
    ///
    /// Returns the new remaining count, or `None` once the count is at zero.
    pub fn tick(&mut self) -> Option<u64> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        Some(self.remaining)
    }

    /// Returns `true` the first time it is called with the count at zero.
    pub fn take_expiry(&mut self) -> bool {
        if self.remaining == 0 && !self.expiry_reported {
            self.expiry_reported = true;
            return true;
        }
        false
    }

    /// Restart from a new value, e.g. after the server corrects the remaining time.
    pub fn rearm(&mut self, seconds: u64) {
        self.remaining = seconds;
        self.expiry_reported = false;
    }
}
