//! Indicator/alarm arbitration.
//!
//! [`AlertArbiter`] remembers what it last applied to each actuator and
//! only talks to the hardware when the desired output differs. The cache
//! starts unknown, so the first command always goes out.

use tracing::{debug, warn};

use vigil_core::SafetyStatus;

use crate::error::ActuatorError;
use crate::ports::AlertPort;

/// Desired indicator/alarm outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AlertOutputs {
    /// Indicator lit
    pub indicator_on: bool,
    /// Alarm sounding
    pub alarm_on: bool,
}

impl AlertOutputs {
    /// Everything off.
    pub const SAFE: AlertOutputs = AlertOutputs {
        indicator_on: false,
        alarm_on: false,
    };

    /// Output mapping for a held status.
    pub fn for_status(status: SafetyStatus) -> Self {
        match status {
            SafetyStatus::Normal => Self::SAFE,
            SafetyStatus::Warning => AlertOutputs {
                indicator_on: true,
                alarm_on: false,
            },
            SafetyStatus::Emergency => AlertOutputs {
                indicator_on: true,
                alarm_on: true,
            },
        }
    }
}

/// Hardware calls made by one [`AlertArbiter::apply`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ApplyReport {
    /// Commands sent to the driver
    pub commands: usize,
    /// Commands that returned an error
    pub failures: usize,
}

/// Diff-based driver for the indicator and alarm.
pub struct AlertArbiter {
    port: Box<dyn AlertPort>,
    alarm_intensity: u8,
    indicator: Option<bool>,
    alarm: Option<bool>,
}

impl AlertArbiter {
    /// Wrap `port`; EMERGENCY sounds the alarm at `alarm_intensity`.
    pub fn new(port: Box<dyn AlertPort>, alarm_intensity: u8) -> Self {
        Self {
            port,
            alarm_intensity: alarm_intensity.min(100),
            indicator: None,
            alarm: None,
        }
    }

    /// Last applied outputs, if both actuators have been commanded.
    pub fn applied(&self) -> Option<AlertOutputs> {
        Some(AlertOutputs {
            indicator_on: self.indicator?,
            alarm_on: self.alarm?,
        })
    }

    /// Configured alarm intensity.
    pub fn alarm_intensity(&self) -> u8 {
        self.alarm_intensity
    }

    /// Drive the outputs toward `desired`, skipping actuators already there.
    pub fn apply(&mut self, desired: AlertOutputs) -> ApplyReport {
        let mut report = ApplyReport::default();

        if self.indicator != Some(desired.indicator_on) {
            let result = self.port.set_indicator(desired.indicator_on);
            record(&mut self.indicator, desired.indicator_on, result, "indicator", &mut report);
        }

        if self.alarm != Some(desired.alarm_on) {
            let result = self.port.set_alarm(desired.alarm_on, self.alarm_intensity);
            record(&mut self.alarm, desired.alarm_on, result, "alarm", &mut report);
        }

        if report.commands > 0 {
            debug!(?desired, commands = report.commands, "alert outputs applied");
        }
        report
    }

    /// Command both actuators off regardless of the cache.
    pub fn force_safe(&mut self) -> ApplyReport {
        self.indicator = None;
        self.alarm = None;
        self.apply(AlertOutputs::SAFE)
    }
}

fn record(
    applied: &mut Option<bool>,
    desired: bool,
    result: Result<(), ActuatorError>,
    actuator: &'static str,
    report: &mut ApplyReport,
) {
    report.commands += 1;
    match result {
        Ok(()) => *applied = Some(desired),
        Err(e) => {
            report.failures += 1;
            if e.may_have_applied() {
                warn!(actuator, error = %e, "actuator command failed; assuming applied");
                *applied = Some(desired);
            } else {
                warn!(actuator, error = %e, "actuator command rejected; will retry");
            }
        }
    }
}
