//! Time adapters.

use chrono::{DateTime, Utc};

use crate::application::ports::outbound::Clock;

/// System clock using the OS time.
pub struct SystemClock;

impl SystemClock {
    pub fn new() -> Self {
        Self
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[cfg(test)]
pub struct FixedClock {
    instant: std::sync::Mutex<DateTime<Utc>>,
}

#[cfg(test)]
impl FixedClock {
    pub fn new(instant: DateTime<Utc>) -> Self {
        Self {
            instant: std::sync::Mutex::new(instant),
        }
    }

    /// Move the clock forward.
    pub fn advance(&self, delta: chrono::TimeDelta) {
        let mut instant = self.instant.lock().unwrap();
        *instant += delta;
    }
}

#[cfg(test)]
impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.instant.lock().unwrap()
    }
}
