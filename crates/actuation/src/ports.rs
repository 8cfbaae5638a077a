//! Port traits between the arbiter and the physical drivers.
//!
//! Calls are blocking and may be slow (a switch move settles for most of
//! a second). The arbiter only ever invokes them from blocking worker
//! threads.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use vigil_core::{parse_flag, CoreError};

use crate::error::ActuatorResult;

/// Indicator and audible alarm.
pub trait AlertPort: Send + 'static {
    /// Turn the indicator on or off.
    fn set_indicator(&mut self, on: bool) -> ActuatorResult<()>;

    /// Turn the alarm on at `intensity` (0-100) or off.
    fn set_alarm(&mut self, on: bool, intensity: u8) -> ActuatorResult<()>;
}

/// Two-position switch actuator.
pub trait SwitchPort: Send + 'static {
    /// Drive to `position` and return once it has settled.
    fn move_to(&mut self, position: SwitchPosition) -> ActuatorResult<()>;
}

/// Switch actuator position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SwitchPosition {
    /// Resting position
    #[default]
    Off,
    /// Engaged position
    On,
}

impl SwitchPosition {
    /// `On` for true.
    pub fn from_bool(on: bool) -> Self {
        if on {
            SwitchPosition::On
        } else {
            SwitchPosition::Off
        }
    }
}

impl fmt::Display for SwitchPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SwitchPosition::Off => f.write_str("OFF"),
            SwitchPosition::On => f.write_str("ON"),
        }
    }
}

impl FromStr for SwitchPosition {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_flag(s).map(SwitchPosition::from_bool)
    }
}
