//! Wall-clock abstraction.
//!
//! Schedule evaluation needs local calendar time, which tokio's paused test
//! clock does not provide. Components take a [`Clock`] so tests can pin or
//! step the wall clock independently of tokio's monotonic time.

use chrono::{DateTime, Duration, Local};
use std::sync::{Arc, Mutex};

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Local>;
}

/// The system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// A clock that only moves when told to. Clones share the same time.
#[derive(Debug, Clone)]
pub struct FixedClock {
    current: Arc<Mutex<DateTime<Local>>>,
}

impl FixedClock {
    pub fn new(start: DateTime<Local>) -> Self {
        Self {
            current: Arc::new(Mutex::new(start)),
        }
    }

    pub fn set(&self, time: DateTime<Local>) {
        *self
            .current
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = time;
    }

    pub fn advance(&self, by: Duration) {
        let mut current = self
            .current
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *current += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Local> {
        *self
            .current
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_fixed_clock_moves_only_when_told() {
        let start = Local.with_ymd_and_hms(2024, 6, 14, 12, 0, 0).unwrap();
        let clock = FixedClock::new(start);
        let shared = clock.clone();

        assert_eq!(clock.now(), start);
        shared.advance(Duration::minutes(90));
        assert_eq!(clock.now(), start + Duration::minutes(90));

        clock.set(start);
        assert_eq!(shared.now(), start);
    }
}
