//! Sensor fusion for the Vigil gateway.
//!
//! - [`SnapshotStore`]: latest value of every sensor channel
//! - [`FusionEvaluator`]: snapshot to raw safety status
//! - [`AlertController`]: raw status to held, debounced status

#![warn(missing_docs)]

pub mod evaluator;
pub mod hysteresis;
pub mod store;

pub use evaluator::{EnvironmentalLimits, FusionEvaluator};
pub use hysteresis::{AlertController, AlertStep};
pub use store::SnapshotStore;
