//! Time sources.
//!
//! Accrual is computed lazily from the clock reading passed into each
//! operation. The only requirement is monotonicity: a clock must never go
//! backwards.

use bond_types::Timestamp;

/// A monotone non-decreasing time source with second granularity.
pub trait Clock {
    /// Current Unix timestamp in seconds.
    fn now(&self) -> Timestamp;
}

/// A clock advanced explicitly by the caller.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ManualClock {
    now: Timestamp,
}

impl ManualClock {
    /// Create a clock reading `start`.
    pub fn new(start: Timestamp) -> Self {
        Self { now: start }
    }

    /// Move the clock forward by `seconds`.
    pub fn advance(&mut self, seconds: u64) {
        self.now = self.now.saturating_add(seconds);
    }

    /// Move the clock to `timestamp`. Earlier timestamps are ignored.
    pub fn set(&mut self, timestamp: Timestamp) {
        if timestamp < self.now {
            tracing::warn!(current = self.now, requested = timestamp, "clock: ignoring backwards set");
            return;
        }
        self.now = timestamp;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        self.now
    }
}

/// Wall-clock time from the operating system.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs()
    }
}
