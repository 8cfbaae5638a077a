//! Outbound gateway events.
//!
//! Serialized as `{"type": "...", "data": {...}}` for live subscribers and
//! upstream republish.

use chrono::Local;
use serde::{Deserialize, Serialize};

use vigil_core::{SafetyStatus, SensorSnapshot};

/// Wall-clock format used in events and persisted samples.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Current local time in [`TIMESTAMP_FORMAT`].
pub fn wall_clock_now() -> String {
    Local::now().format(TIMESTAMP_FORMAT).to_string()
}

/// Event published by the gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum GatewayEvent {
    /// One evaluator tick worth of fused data
    SensorData(SensorReport),
    /// Device liveness and control flags changed
    DeviceStatus(DeviceStatusReport),
}

impl GatewayEvent {
    /// Event type tag.
    pub fn kind(&self) -> &'static str {
        match self {
            GatewayEvent::SensorData(_) => "sensor_data",
            GatewayEvent::DeviceStatus(_) => "device_status",
        }
    }
}

/// Snapshot plus held status at one tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorReport {
    pub timestamp: String,
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub button: u8,
    pub abnormal_movement: u8,
    pub sound_alert: u8,
    pub person_present: u8,
    pub status: SafetyStatus,
    pub sensor_online: bool,
    pub processing_enabled: bool,
}

impl SensorReport {
    pub fn new(
        timestamp: String,
        snapshot: &SensorSnapshot,
        status: SafetyStatus,
        sensor_online: bool,
        processing_enabled: bool,
    ) -> Self {
        Self {
            timestamp,
            temperature: snapshot.temperature,
            humidity: snapshot.humidity,
            button: u8::from(snapshot.button),
            abnormal_movement: u8::from(snapshot.abnormal_movement),
            sound_alert: u8::from(snapshot.sound_alert),
            person_present: u8::from(snapshot.person_present),
            status,
            sensor_online,
            processing_enabled,
        }
    }
}

/// Liveness and control flags of both nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceStatusReport {
    pub sensor_online: bool,
    pub gateway_online: bool,
    pub sensor_control: bool,
    pub gateway_control: bool,
}
