//! Device liveness tracking for the Vigil gateway.

#![warn(missing_docs)]

pub mod tracker;

pub use tracker::{DevicePresence, OfflineReason, PresenceEvent, PresenceEventKind, PresenceTracker};
