//! Time utility functions

use chrono::{DateTime, Duration, Local};
use std::sync::{Arc, Mutex, PoisonError};

/// Source of wall-clock arrival times
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Local>;
}

/// System clock in the server's local timezone
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// Manually driven clock.
///
/// Clones share the same time, so a test can hold one handle and give
/// another to the server.
#[derive(Debug, Clone)]
pub struct ManualClock {
    current: Arc<Mutex<DateTime<Local>>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Local>) -> Self {
        Self {
            current: Arc::new(Mutex::new(start)),
        }
    }

    pub fn set(&self, time: DateTime<Local>) {
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = time;
    }

    pub fn advance(&self, by: Duration) {
        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        *current = *current + by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Local> {
        *self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Format timestamp as RFC3339
pub fn format_timestamp(timestamp: DateTime<Local>) -> String {
    timestamp.to_rfc3339()
}
