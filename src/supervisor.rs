//! Keep-alive timer for a device link.
//!
//! The supervisor only tracks the next deadline; the worker loop sleeps
//! until it and calls `ping()` on the link.

use std::time::{Duration, Instant};

use tracing::trace;

/// Interval between keep-alive probes.
pub const PING_INTERVAL: Duration = Duration::from_millis(1000);

#[derive(Debug, Clone)]
pub struct LinkSupervisor {
    interval: Duration,
    keep_alive: bool,
    deadline: Option<Instant>,
}

impl Default for LinkSupervisor {
    fn default() -> Self {
        Self::new(PING_INTERVAL, true)
    }
}

impl LinkSupervisor {
    #[must_use]
    pub const fn new(interval: Duration, keep_alive: bool) -> Self {
        Self {
            interval,
            keep_alive,
            deadline: None,
        }
    }

    pub const fn interval(&self) -> Duration {
        self.interval
    }

    pub const fn keep_alive(&self) -> bool {
        self.keep_alive
    }

    /// Turning keep-alive off disarms immediately.
    pub fn set_keep_alive(&mut self, enabled: bool) {
        self.keep_alive = enabled;
        if !enabled {
            self.stop();
        }
    }

    /// Arm a full interval from `now`, or disarm if pinging is not wanted.
    pub fn restart(&mut self, backlight_enabled: bool, now: Instant) {
        if backlight_enabled && self.keep_alive {
            self.deadline = Some(now + self.interval);
        } else {
            self.stop();
        }
    }

    pub fn stop(&mut self) {
        if self.deadline.take().is_some() {
            trace!("Keep-alive disarmed");
        }
    }

    pub const fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    pub const fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_due(&self, now: Instant) -> bool {
        self.deadline.is_some_and(|deadline| now >= deadline)
    }

    /// Consume a due tick and schedule the next one.
    ///
    /// Returns false if the timer is disarmed or not yet due.
    pub fn fire(&mut self, now: Instant) -> bool {
        if !self.is_due(now) {
            return false;
        }
        self.deadline = Some(now + self.interval);
        true
    }
}
