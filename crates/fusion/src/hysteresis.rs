//! Alert hysteresis controller.
//!
//! A Moore machine over [`SafetyStatus`] plus a hold deadline. An alert
//! stays latched until the hold elapses; a higher tier always gets
//! through immediately and restarts the hold.

use std::time::Duration;

use vigil_core::{Instant, SafetyStatus};

/// Result of one controller step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlertStep {
    /// Held status after this tick
    pub status: SafetyStatus,
    /// Held status before this tick
    pub previous: SafetyStatus,
    /// Raw status fed in
    pub raw: SafetyStatus,
    /// Active hold deadline, if any
    pub hold_until: Option<Instant>,
}

impl AlertStep {
    /// True when the held status changed on this tick.
    pub fn changed(&self) -> bool {
        self.status != self.previous
    }
}

/// Debounces raw fused status into a held status.
#[derive(Debug, Clone)]
pub struct AlertController {
    hold: Duration,
    current: SafetyStatus,
    hold_until: Option<Instant>,
}

impl AlertController {
    /// Start at NORMAL with no hold.
    pub fn new(hold: Duration) -> Self {
        Self {
            hold,
            current: SafetyStatus::Normal,
            hold_until: None,
        }
    }

    /// Held status.
    pub fn current(&self) -> SafetyStatus {
        self.current
    }

    /// Active hold deadline.
    pub fn hold_until(&self) -> Option<Instant> {
        self.hold_until
    }

    /// Return to NORMAL and drop any hold.
    pub fn reset(&mut self) {
        self.current = SafetyStatus::Normal;
        self.hold_until = None;
    }

    /// Feed one raw status sampled at `now`.
    pub fn step(&mut self, raw: SafetyStatus, now: Instant) -> AlertStep {
        let previous = self.current;
        let holding = matches!(self.hold_until, Some(until) if now < until);

        if raw.is_alert() && (self.current == SafetyStatus::Normal || !holding) {
            self.latch(raw, now);
        } else if holding {
            // NORMAL and same-or-lower tiers ride out the hold.
            if raw > self.current {
                self.latch(raw, now);
            }
        } else {
            self.reset();
        }

        AlertStep {
            status: self.current,
            previous,
            raw,
            hold_until: self.hold_until,
        }
    }

    fn latch(&mut self, status: SafetyStatus, now: Instant) {
        self.current = status;
        self.hold_until = Some(now + self.hold);
    }
}
