//! Shared domain types: safety status, sensor snapshot and partial updates.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::clock::Instant;
use crate::error::CoreError;

/// Presence source name of the remote sensor node.
pub const SENSOR_NODE: &str = "sensor-node";

/// Presence source name of this gateway.
pub const GATEWAY_NODE: &str = "gateway-node";

/// Fused safety status, ordered by severity.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SafetyStatus {
    /// Nothing to report
    #[default]
    Normal,
    /// Attention required
    Warning,
    /// Immediate response required
    Emergency,
}

impl SafetyStatus {
    /// Wire and storage label.
    pub fn as_str(&self) -> &'static str {
        match self {
            SafetyStatus::Normal => "NORMAL",
            SafetyStatus::Warning => "WARNING",
            SafetyStatus::Emergency => "EMERGENCY",
        }
    }

    /// True for WARNING and EMERGENCY.
    pub fn is_alert(&self) -> bool {
        *self != SafetyStatus::Normal
    }
}

impl fmt::Display for SafetyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SafetyStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "NORMAL" => Ok(SafetyStatus::Normal),
            "WARNING" => Ok(SafetyStatus::Warning),
            "EMERGENCY" => Ok(SafetyStatus::Emergency),
            _ => Err(CoreError::UnknownStatus(s.to_string())),
        }
    }
}

/// Latest known value of every sensor channel.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SensorSnapshot {
    /// Ambient temperature in °C, if ever reported
    pub temperature: Option<f64>,
    /// Relative humidity in %, if ever reported
    pub humidity: Option<f64>,
    /// Manual emergency button
    pub button: bool,
    /// Motion sensor flagged abnormal movement
    pub abnormal_movement: bool,
    /// Acoustic sensor tripped
    pub sound_alert: bool,
    /// Occupancy estimator sees a person
    pub person_present: bool,
    /// When the snapshot last changed (`None` before the first update)
    pub captured_at: Option<Instant>,
}

impl SensorSnapshot {
    /// Merge the fields present in `update`, leaving the rest untouched.
    ///
    /// Returns false (and does not touch `captured_at`) for an empty update.
    pub fn apply(&mut self, update: &SensorUpdate, at: Instant) -> bool {
        if update.is_empty() {
            return false;
        }
        if let Some(v) = update.temperature {
            self.temperature = Some(v);
        }
        if let Some(v) = update.humidity {
            self.humidity = Some(v);
        }
        if let Some(v) = update.button {
            self.button = v;
        }
        if let Some(v) = update.abnormal_movement {
            self.abnormal_movement = v;
        }
        if let Some(v) = update.sound_alert {
            self.sound_alert = v;
        }
        if let Some(v) = update.person_present {
            self.person_present = v;
        }
        self.captured_at = Some(at);
        true
    }
}

/// Partial sensor update; `None` means "not carried by this message".
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SensorUpdate {
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub button: Option<bool>,
    pub abnormal_movement: Option<bool>,
    pub sound_alert: Option<bool>,
    pub person_present: Option<bool>,
}

impl SensorUpdate {
    /// Update carrying only the acoustic channel.
    pub fn sound(active: bool) -> Self {
        Self {
            sound_alert: Some(active),
            ..Self::default()
        }
    }

    /// Update carrying only the occupancy channel.
    pub fn occupancy(present: bool) -> Self {
        Self {
            person_present: Some(present),
            ..Self::default()
        }
    }

    /// True when no field is set.
    pub fn is_empty(&self) -> bool {
        self.temperature.is_none()
            && self.humidity.is_none()
            && self.button.is_none()
            && self.abnormal_movement.is_none()
            && self.sound_alert.is_none()
            && self.person_present.is_none()
    }
}
