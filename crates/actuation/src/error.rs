//! Actuator error types.

use thiserror::Error;

/// Errors reported by actuator drivers.
#[derive(Debug, Error)]
pub enum ActuatorError {
    /// The command provably did not take effect
    #[error("{actuator} rejected command: {reason}")]
    Rejected {
        /// Actuator name
        actuator: &'static str,
        /// Driver message
        reason: String,
    },

    /// The command failed part-way; the hardware may have changed
    #[error("{actuator} command outcome unknown: {reason}")]
    Indeterminate {
        /// Actuator name
        actuator: &'static str,
        /// Driver message
        reason: String,
    },

    /// The blocking worker running the command panicked or was cancelled
    #[error("Actuator worker failed: {0}")]
    Worker(String),
}

impl ActuatorError {
    /// False only when the hardware is known to be unchanged.
    pub fn may_have_applied(&self) -> bool {
        !matches!(self, ActuatorError::Rejected { .. })
    }
}

/// Result type for actuator operations.
pub type ActuatorResult<T> = Result<T, ActuatorError>;
