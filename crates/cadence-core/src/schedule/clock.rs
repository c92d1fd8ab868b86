//! Time sources
//!
//! Engine functions never read the wall clock; callers pass `at` explicitly.
//! Front ends obtain that instant from a [`Clock`], which tests replace with a
//! [`FixedClock`].

use chrono::{DateTime, Duration, Utc};

/// Source of the current instant
pub trait Clock: Send + Sync {
    /// The instant to treat as "now"
    fn now(&self) -> DateTime<Utc>;
}

/// Reads the system clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Always returns the same instant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedClock(pub DateTime<Utc>);

impl FixedClock {
    /// Pin time at `at`
    pub fn new(at: DateTime<Utc>) -> Self {
        Self(at)
    }

    /// A clock moved forward (or back) by `delta`
    pub fn advanced(self, delta: Duration) -> Self {
        Self(self.0 + delta)
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> DateTime<Utc> {
        (**self).now()
    }
}
