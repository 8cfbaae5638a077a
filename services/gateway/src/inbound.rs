//! Inbound message decoding.
//!
//! Maps a transport message to an [`InboundCommand`] by topic. Nothing here
//! touches shared state; a decoding error means the message is dropped.

use serde::Deserialize;

use vigil_actuation::SwitchPosition;
use vigil_core::config::TopicConfig;
use vigil_core::flag::deserialize_opt_flag;
use vigil_core::{parse_flag, SensorUpdate};

use crate::error::InboundError;
use crate::transport::TransportMessage;

/// Sensor-node data message. Every field is optional.
#[derive(Debug, Default, Deserialize)]
struct SensorMessage {
    #[serde(default)]
    temperature: Option<f64>,
    #[serde(default)]
    humidity: Option<f64>,
    #[serde(rename = "buttonPressed", default, deserialize_with = "deserialize_opt_flag")]
    button_pressed: Option<bool>,
    #[serde(rename = "abnormalMovement", default, deserialize_with = "deserialize_opt_flag")]
    abnormal_movement: Option<bool>,
}

impl From<SensorMessage> for SensorUpdate {
    fn from(msg: SensorMessage) -> Self {
        SensorUpdate {
            temperature: msg.temperature,
            humidity: msg.humidity,
            button: msg.button_pressed,
            abnormal_movement: msg.abnormal_movement,
            ..SensorUpdate::default()
        }
    }
}

/// Decoded inbound message.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundCommand {
    /// Partial sensor data; also a liveness signal from the sensor node
    SensorData(SensorUpdate),
    /// Retained liveness of the sensor node
    SensorStatus(bool),
    /// Sensor node control flag
    SensorControl(bool),
    /// Gateway processing flag
    GatewayControl(bool),
    /// Switch actuator request
    Switch(SwitchPosition),
    /// Remote acoustic estimator
    Sound(bool),
    /// Remote occupancy estimator
    Occupancy(bool),
    /// Our own status topic echoed back by the transport
    GatewayStatus(bool),
}

/// Decode `msg` according to the configured topics.
pub fn decode(topics: &TopicConfig, msg: &TransportMessage) -> Result<InboundCommand, InboundError> {
    let topic = msg.topic.as_str();
    let flag = || {
        parse_flag(&msg.payload).map_err(|source| InboundError::Flag {
            topic: msg.topic.clone(),
            source,
        })
    };

    if topic == topics.sensor_data {
        let parsed: SensorMessage =
            serde_json::from_str(&msg.payload).map_err(|source| InboundError::Json {
                topic: msg.topic.clone(),
                source,
            })?;
        Ok(InboundCommand::SensorData(parsed.into()))
    } else if topic == topics.sensor_status {
        flag().map(InboundCommand::SensorStatus)
    } else if topic == topics.sensor_control {
        flag().map(InboundCommand::SensorControl)
    } else if topic == topics.gateway_control {
        flag().map(InboundCommand::GatewayControl)
    } else if topic == topics.switch {
        flag().map(|on| InboundCommand::Switch(SwitchPosition::from_bool(on)))
    } else if topic == topics.sound {
        flag().map(InboundCommand::Sound)
    } else if topic == topics.occupancy {
        flag().map(InboundCommand::Occupancy)
    } else if topic == topics.gateway_status {
        flag().map(InboundCommand::GatewayStatus)
    } else {
        Err(InboundError::UnknownTopic(msg.topic.clone()))
    }
}
