//! Fusion evaluator: snapshot in, raw safety status out.
//!
//! Rules are checked in precedence order and the first match wins:
//!
//! | rule                 | `standard` | `absence_emergency` |
//! |----------------------|------------|---------------------|
//! | button pressed       | EMERGENCY  | EMERGENCY           |
//! | abnormal movement    | EMERGENCY  | EMERGENCY           |
//! | person absent        | WARNING    | EMERGENCY           |
//! | sound alert          | WARNING    | WARNING             |
//! | environment out of range (opt-in) | WARNING | WARNING  |
//!
//! Unknown temperature or humidity never escalates.

use vigil_core::config::FusionConfig;
use vigil_core::{FusionPolicy, Range, SafetyStatus, SensorSnapshot};

/// Optional comfort band check.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnvironmentalLimits {
    /// Acceptable temperature band in °C
    pub temperature: Range,
    /// Acceptable relative humidity band in %
    pub humidity: Range,
}

impl EnvironmentalLimits {
    /// True when a known, finite reading falls outside its band.
    fn violated(&self, snapshot: &SensorSnapshot) -> bool {
        let outside = |value: Option<f64>, range: &Range| {
            matches!(value, Some(v) if v.is_finite() && !range.contains(v))
        };
        outside(snapshot.temperature, &self.temperature)
            || outside(snapshot.humidity, &self.humidity)
    }
}

/// Pure, deterministic fusion of a [`SensorSnapshot`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FusionEvaluator {
    policy: FusionPolicy,
    environmental: Option<EnvironmentalLimits>,
}

impl Default for FusionEvaluator {
    fn default() -> Self {
        Self::new(FusionPolicy::Standard)
    }
}

impl FusionEvaluator {
    /// Evaluator for `policy` with the environmental check disabled.
    pub fn new(policy: FusionPolicy) -> Self {
        Self {
            policy,
            environmental: None,
        }
    }

    /// Evaluator built from the `[fusion]` config section.
    pub fn from_config(config: &FusionConfig) -> Self {
        let environmental = config.enable_environmental_warning.then(|| EnvironmentalLimits {
            temperature: config.temp_range,
            humidity: config.humidity_range,
        });
        Self {
            policy: config.policy,
            environmental,
        }
    }

    /// Enable the environmental WARNING rule.
    pub fn with_environmental_limits(mut self, limits: EnvironmentalLimits) -> Self {
        self.environmental = Some(limits);
        self
    }

    /// Active rule set.
    pub fn policy(&self) -> FusionPolicy {
        self.policy
    }

    /// Fuse `snapshot` into a raw status.
    pub fn evaluate(&self, snapshot: &SensorSnapshot) -> SafetyStatus {
        if snapshot.button || snapshot.abnormal_movement {
            return SafetyStatus::Emergency;
        }

        match self.policy {
            FusionPolicy::Standard => {
                if snapshot.sound_alert || !snapshot.person_present {
                    return SafetyStatus::Warning;
                }
            }
            FusionPolicy::AbsenceEmergency => {
                if !snapshot.person_present {
                    return SafetyStatus::Emergency;
                }
                if snapshot.sound_alert {
                    return SafetyStatus::Warning;
                }
            }
        }

        match &self.environmental {
            Some(limits) if limits.violated(snapshot) => SafetyStatus::Warning,
            _ => SafetyStatus::Normal,
        }
    }
}
