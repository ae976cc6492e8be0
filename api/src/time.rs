//! Clock used to stamp ledger rows and profile updates.
//!
//! With the `mock-time` feature the clock only moves when a test tells it
//! to, which makes transaction ordering deterministic.

use jiff::Timestamp;
#[cfg(feature = "mock-time")]
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Clone)]
pub struct TimeSource {
    #[cfg(feature = "mock-time")]
    time: Arc<Mutex<Timestamp>>,
}

#[cfg(not(feature = "mock-time"))]
impl TimeSource {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self {}
    }

    pub fn now(&self) -> Timestamp {
        Timestamp::now()
    }
}

#[cfg(feature = "mock-time")]
impl TimeSource {
    pub fn new(initial_time: Timestamp) -> Self {
        Self {
            time: Arc::new(Mutex::new(initial_time)),
        }
    }

    pub fn now(&self) -> Timestamp {
        *self.clock()
    }

    /// Move the clock forward, e.g. between two deposits that must not
    /// share a timestamp.
    pub fn advance(&self, span: jiff::Span) {
        let mut time = self.clock();
        *time = *time + span;
    }

    pub fn set(&self, time: Timestamp) {
        *self.clock() = time;
    }

    fn clock(&self) -> MutexGuard<'_, Timestamp> {
        // a panic while holding the lock leaves the timestamp intact
        self.time.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
