//! Gateway configuration.
//!
//! Loaded from a TOML file; every section and field has a default so an
//! empty file (or no file at all) yields a working gateway.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::types::{GATEWAY_NODE, SENSOR_NODE};

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read configuration file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse configuration: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Which rule set the fusion evaluator applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FusionPolicy {
    /// Button or abnormal movement is an emergency; sound or an empty room is a warning.
    #[default]
    Standard,
    /// Like `Standard`, but an empty room is an emergency.
    AbsenceEmergency,
}

/// Inclusive `[min, max]` band.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Range {
    pub min: f64,
    pub max: f64,
}

impl Range {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// True when `value` lies within the band, bounds included.
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluatorConfig {
    /// Evaluator tick period in milliseconds
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,
    /// Minimum time an alert is held after it is raised, in milliseconds
    #[serde(default = "default_alert_hold_ms")]
    pub alert_hold_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FusionConfig {
    #[serde(default)]
    pub policy: FusionPolicy,
    #[serde(default)]
    pub enable_environmental_warning: bool,
    #[serde(default = "default_temp_range")]
    pub temp_range: Range,
    #[serde(default = "default_humidity_range")]
    pub humidity_range: Range,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresenceConfig {
    /// Silence after which a source is declared offline, in milliseconds
    #[serde(default = "default_presence_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_sweep_interval_ms")]
    pub sweep_interval_ms: u64,
    #[serde(default = "default_sensor_source")]
    pub sensor_source: String,
    #[serde(default = "default_gateway_source")]
    pub gateway_source: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActuatorConfig {
    /// Alarm intensity (0-100) used for EMERGENCY
    #[serde(default = "default_alarm_intensity")]
    pub alarm_intensity: u8,
    #[serde(default = "default_alarm_frequency_hz")]
    pub alarm_frequency_hz: u32,
    #[serde(default = "default_switch_off_angle")]
    pub switch_off_angle: f64,
    #[serde(default = "default_switch_on_angle")]
    pub switch_on_angle: f64,
    /// Time the switch actuator needs to reach its position, in milliseconds
    #[serde(default = "default_switch_settle_ms")]
    pub switch_settle_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatConfig {
    #[serde(default = "default_heartbeat_interval_ms")]
    pub interval_ms: u64,
}

/// Transport topic names.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicConfig {
    #[serde(default = "default_sensor_data_topic")]
    pub sensor_data: String,
    #[serde(default = "default_sensor_status_topic")]
    pub sensor_status: String,
    #[serde(default = "default_sensor_control_topic")]
    pub sensor_control: String,
    #[serde(default = "default_gateway_status_topic")]
    pub gateway_status: String,
    #[serde(default = "default_gateway_control_topic")]
    pub gateway_control: String,
    #[serde(default = "default_switch_topic")]
    pub switch: String,
    #[serde(default = "default_sound_topic")]
    pub sound: String,
    #[serde(default = "default_occupancy_topic")]
    pub occupancy: String,
    /// Outbound republish of gateway events
    #[serde(default = "default_events_topic")]
    pub events: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    #[serde(default = "default_transport_listen")]
    pub listen_addr: SocketAddr,
    /// Capacity of the inbound message queue
    #[serde(default = "default_inbound_capacity")]
    pub inbound_capacity: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiveFeedConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_live_feed_bind")]
    pub bind_addr: SocketAddr,
    /// Per-subscriber queue depth before events are dropped for that subscriber
    #[serde(default = "default_subscriber_capacity")]
    pub subscriber_capacity: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
}

/// Sensor channel fed by a local input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputChannel {
    Sound,
    Occupancy,
}

/// Local value-file input, e.g. a sysfs GPIO `value` file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputConfig {
    pub name: String,
    pub path: PathBuf,
    pub channel: InputChannel,
    #[serde(default = "default_input_poll_ms")]
    pub poll_ms: u64,
    /// When false, a `0` reading means active
    #[serde(default = "default_true")]
    pub active_high: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Fallback filter when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

/// Root gateway configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default)]
    pub evaluator: EvaluatorConfig,
    #[serde(default)]
    pub fusion: FusionConfig,
    #[serde(default)]
    pub presence: PresenceConfig,
    #[serde(default)]
    pub actuators: ActuatorConfig,
    #[serde(default)]
    pub heartbeat: HeartbeatConfig,
    #[serde(default)]
    pub topics: TopicConfig,
    #[serde(default)]
    pub transport: TransportConfig,
    #[serde(default)]
    pub live_feed: LiveFeedConfig,
    #[serde(default)]
    pub persistence: PersistenceConfig,
    #[serde(default)]
    pub inputs: Vec<InputConfig>,
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_tick_ms() -> u64 {
    1000
}

fn default_alert_hold_ms() -> u64 {
    3000
}

fn default_temp_range() -> Range {
    Range::new(15.0, 37.0)
}

fn default_humidity_range() -> Range {
    Range::new(20.0, 70.0)
}

fn default_presence_timeout_ms() -> u64 {
    10_000
}

fn default_sweep_interval_ms() -> u64 {
    2000
}

fn default_sensor_source() -> String {
    SENSOR_NODE.to_string()
}

fn default_gateway_source() -> String {
    GATEWAY_NODE.to_string()
}

fn default_alarm_intensity() -> u8 {
    75
}

fn default_alarm_frequency_hz() -> u32 {
    1800
}

fn default_switch_off_angle() -> f64 {
    0.0
}

fn default_switch_on_angle() -> f64 {
    90.0
}

fn default_switch_settle_ms() -> u64 {
    800
}

fn default_heartbeat_interval_ms() -> u64 {
    5000
}

fn default_sensor_data_topic() -> String {
    "esp32/data".to_string()
}

fn default_sensor_status_topic() -> String {
    "esp32/status".to_string()
}

fn default_sensor_control_topic() -> String {
    "esp32/control".to_string()
}

fn default_gateway_status_topic() -> String {
    "pi/status".to_string()
}

fn default_gateway_control_topic() -> String {
    "pi/control".to_string()
}

fn default_switch_topic() -> String {
    "pi/servo".to_string()
}

fn default_sound_topic() -> String {
    "pi/sound".to_string()
}

fn default_occupancy_topic() -> String {
    "pi/occupancy".to_string()
}

fn default_events_topic() -> String {
    "pi/events".to_string()
}

fn default_transport_listen() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 1884))
}

fn default_inbound_capacity() -> usize {
    256
}

fn default_live_feed_bind() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8765))
}

fn default_subscriber_capacity() -> usize {
    64
}

fn default_db_path() -> PathBuf {
    PathBuf::from("vigil.db")
}

fn default_input_poll_ms() -> u64 {
    50
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            tick_ms: default_tick_ms(),
            alert_hold_ms: default_alert_hold_ms(),
        }
    }
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            policy: FusionPolicy::default(),
            enable_environmental_warning: false,
            temp_range: default_temp_range(),
            humidity_range: default_humidity_range(),
        }
    }
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_presence_timeout_ms(),
            sweep_interval_ms: default_sweep_interval_ms(),
            sensor_source: default_sensor_source(),
            gateway_source: default_gateway_source(),
        }
    }
}

impl Default for ActuatorConfig {
    fn default() -> Self {
        Self {
            alarm_intensity: default_alarm_intensity(),
            alarm_frequency_hz: default_alarm_frequency_hz(),
            switch_off_angle: default_switch_off_angle(),
            switch_on_angle: default_switch_on_angle(),
            switch_settle_ms: default_switch_settle_ms(),
        }
    }
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_heartbeat_interval_ms(),
        }
    }
}

impl Default for TopicConfig {
    fn default() -> Self {
        Self {
            sensor_data: default_sensor_data_topic(),
            sensor_status: default_sensor_status_topic(),
            sensor_control: default_sensor_control_topic(),
            gateway_status: default_gateway_status_topic(),
            gateway_control: default_gateway_control_topic(),
            switch: default_switch_topic(),
            sound: default_sound_topic(),
            occupancy: default_occupancy_topic(),
            events: default_events_topic(),
        }
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_transport_listen(),
            inbound_capacity: default_inbound_capacity(),
        }
    }
}

impl Default for LiveFeedConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind_addr: default_live_feed_bind(),
            subscriber_capacity: default_subscriber_capacity(),
        }
    }
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            db_path: default_db_path(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl EvaluatorConfig {
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    pub fn alert_hold(&self) -> Duration {
        Duration::from_millis(self.alert_hold_ms)
    }
}

impl PresenceConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }
}

impl ActuatorConfig {
    pub fn switch_settle(&self) -> Duration {
        Duration::from_millis(self.switch_settle_ms)
    }
}

impl HeartbeatConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl InputConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_ms)
    }
}

impl GatewayConfig {
    /// Load and validate a configuration file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: GatewayConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the runtime cannot operate with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::ValidationError(msg));

        if self.evaluator.tick_ms == 0 {
            return invalid("evaluator.tick_ms must be greater than zero".into());
        }
        if self.presence.timeout_ms == 0 {
            return invalid("presence.timeout_ms must be greater than zero".into());
        }
        if self.presence.sweep_interval_ms == 0 {
            return invalid("presence.sweep_interval_ms must be greater than zero".into());
        }
        if self.heartbeat.interval_ms == 0 {
            return invalid("heartbeat.interval_ms must be greater than zero".into());
        }
        if self.actuators.alarm_intensity > 100 {
            return invalid(format!(
                "actuators.alarm_intensity must be 0-100, got {}",
                self.actuators.alarm_intensity
            ));
        }
        for (name, range) in [
            ("fusion.temp_range", &self.fusion.temp_range),
            ("fusion.humidity_range", &self.fusion.humidity_range),
        ] {
            if !(range.min <= range.max) {
                return invalid(format!(
                    "{name} is inverted: min {} > max {}",
                    range.min, range.max
                ));
            }
        }
        if self.presence.sensor_source == self.presence.gateway_source {
            return invalid("presence sources must have distinct names".into());
        }
        if self.transport.inbound_capacity == 0 || self.live_feed.subscriber_capacity == 0 {
            return invalid("queue capacities must be greater than zero".into());
        }
        for input in &self.inputs {
            if input.poll_ms == 0 {
                return invalid(format!("inputs.{}: poll_ms must be greater than zero", input.name));
            }
        }
        Ok(())
    }
}
