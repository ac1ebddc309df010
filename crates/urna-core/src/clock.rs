//! Clock abstraction for deterministic time-dependent logic.
//!
//! The gate's cache TTL, the service session's token expiry and the
//! scheduler's eligibility windows all compare against "now". Production
//! code injects [`SystemClock`]; tests inject a settable clock so window
//! and staleness behaviour can be pinned exactly.

use std::fmt;

use chrono::{DateTime, Utc};

/// Abstraction over wall-clock time sources.
pub trait Clock: Send + Sync + fmt::Debug {
    /// Returns the current wall-clock time in UTC.
    fn now_utc(&self) -> DateTime<Utc>;
}

/// Production clock backed by the system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Settable clock for tests.
///
/// Shared freely via `Arc`; `set` moves time for every holder.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: std::sync::Mutex<DateTime<Utc>>,
}

impl ManualClock {
    /// Creates a clock pinned to the given instant.
    #[must_use]
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: std::sync::Mutex::new(now),
        }
    }

    /// Moves the clock to a new instant.
    pub fn set(&self, now: DateTime<Utc>) {
        *self
            .now
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = now;
    }

    /// Advances the clock by a duration.
    pub fn advance(&self, by: chrono::Duration) {
        let mut now = self
            .now
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now_utc(&self) -> DateTime<Utc> {
        *self
            .now
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}
