//! Actuator control for the Vigil gateway.
//!
//! Hardware is reached through the [`AlertPort`] and [`SwitchPort`]
//! traits. [`ActuatorArbiter`] turns held safety status and switch
//! requests into idempotent, serialized driver calls.

pub mod alert;
pub mod arbiter;
pub mod dry_run;
pub mod error;
pub mod ports;

pub use alert::{AlertArbiter, AlertOutputs, ApplyReport};
pub use arbiter::{ActuatorArbiter, ActuatorState};
pub use dry_run::{LoggingAlertPort, LoggingSwitchPort};
pub use error::{ActuatorError, ActuatorResult};
pub use ports::{AlertPort, SwitchPort, SwitchPosition};
