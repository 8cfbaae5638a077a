//! Logging drivers for running the gateway without hardware attached.

use std::time::Duration;

use tracing::info;
use vigil_core::config::ActuatorConfig;

use crate::error::ActuatorResult;
use crate::ports::{AlertPort, SwitchPort, SwitchPosition};

/// PWM duty cycle (%) for a hobby servo at `angle` degrees on a 50 Hz signal.
pub fn servo_duty(angle: f64) -> f64 {
    2.5 + angle / 18.0
}

/// Indicator and alarm driver that only logs.
#[derive(Debug, Clone)]
pub struct LoggingAlertPort {
    frequency_hz: u32,
}

impl LoggingAlertPort {
    pub fn new(config: &ActuatorConfig) -> Self {
        Self {
            frequency_hz: config.alarm_frequency_hz,
        }
    }
}

impl AlertPort for LoggingAlertPort {
    fn set_indicator(&mut self, on: bool) -> ActuatorResult<()> {
        info!(on, "indicator");
        Ok(())
    }

    fn set_alarm(&mut self, on: bool, intensity: u8) -> ActuatorResult<()> {
        if on {
            info!(frequency_hz = self.frequency_hz, duty = intensity, "alarm on");
        } else {
            info!("alarm off");
        }
        Ok(())
    }
}

/// Switch driver that logs the servo command and waits out the settle time.
#[derive(Debug, Clone)]
pub struct LoggingSwitchPort {
    off_angle: f64,
    on_angle: f64,
    settle: Duration,
}

impl LoggingSwitchPort {
    pub fn new(config: &ActuatorConfig) -> Self {
        Self {
            off_angle: config.switch_off_angle,
            on_angle: config.switch_on_angle,
            settle: config.switch_settle(),
        }
    }

    fn angle(&self, position: SwitchPosition) -> f64 {
        match position {
            SwitchPosition::Off => self.off_angle,
            SwitchPosition::On => self.on_angle,
        }
    }
}

impl SwitchPort for LoggingSwitchPort {
    fn move_to(&mut self, position: SwitchPosition) -> ActuatorResult<()> {
        let angle = self.angle(position);
        info!(%position, angle, duty = servo_duty(angle), "switch servo");
        std::thread::sleep(self.settle);
        Ok(())
    }
}
