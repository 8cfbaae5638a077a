//! Core functionality for the Vigil safety gateway.
//!
//! This crate provides the shared types, configuration, clock and
//! logging used across the Vigil workspace.

pub mod clock;
pub mod config;
pub mod error;
pub mod flag;
pub mod logging;
pub mod types;

pub use clock::{Clock, Instant, ManualClock, TokioClock};
pub use config::{ConfigError, FusionPolicy, GatewayConfig, Range};
pub use error::{CoreError, CoreResult};
pub use flag::{flag_str, parse_flag};
pub use types::{SafetyStatus, SensorSnapshot, SensorUpdate, GATEWAY_NODE, SENSOR_NODE};
