//! Monotonic time source.
//!
//! Components never call `Instant::now()` themselves. They receive an
//! explicit `now` or read it from a [`Clock`], so tests can drive time
//! either with [`ManualClock`] or with tokio's paused runtime clock.

use std::fmt;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

pub use tokio::time::Instant;

/// Source of monotonic timestamps.
pub trait Clock: Send + Sync + fmt::Debug {
    /// Current instant.
    fn now(&self) -> Instant;
}

/// Clock backed by the tokio timer.
///
/// Under `#[tokio::test(start_paused = true)]` this follows the paused
/// runtime clock, so interval-driven loops and timestamps agree.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioClock;

impl Clock for TokioClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Manually advanced clock for deterministic tests.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<Instant>,
}

impl ManualClock {
    /// Create a clock frozen at the current instant.
    pub fn new() -> Self {
        Self::starting_at(Instant::now())
    }

    /// Create a clock frozen at `start`.
    pub fn starting_at(start: Instant) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Move the clock forward by `by`.
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
