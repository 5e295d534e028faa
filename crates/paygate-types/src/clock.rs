//! Clock abstraction
//!
//! All time reads go through an injected [`Clock`] so the expiry sweep
//! and cache TTLs are testable with a manually-advanced clock.

use std::sync::RwLock;

use chrono::{DateTime, Duration, Utc};

/// Source of the current UTC time
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually-advanced clock for tests
#[derive(Debug)]
pub struct ManualClock {
    now: RwLock<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: RwLock::new(start),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.write().expect("clock lock poisoned");
        *now = *now + by;
    }

    pub fn set(&self, to: DateTime<Utc>) {
        *self.now.write().expect("clock lock poisoned") = to;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.read().expect("clock lock poisoned")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_advances() {
        let clock = ManualClock::new(Utc::now());
        let t0 = clock.now();
        clock.advance(Duration::minutes(6));
        assert_eq!(clock.now() - t0, Duration::minutes(6));
    }
}
