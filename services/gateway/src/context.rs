//! Shared gateway state.
//!
//! Every task gets an `Arc<GatewayContext>`; there is no global state.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use vigil_actuation::ActuatorArbiter;
use vigil_core::{Clock, GatewayConfig, Instant};
use vigil_fanout::{DeviceStatusReport, EventFanout, GatewayEvent};
use vigil_fusion::{FusionEvaluator, SnapshotStore};
use vigil_presence::{PresenceEvent, PresenceTracker};

use crate::transport::TransportHub;

pub struct GatewayContext {
    pub config: GatewayConfig,
    pub clock: Arc<dyn Clock>,
    pub store: SnapshotStore,
    pub presence: PresenceTracker,
    pub evaluator: FusionEvaluator,
    pub actuators: ActuatorArbiter,
    pub fanout: Arc<EventFanout>,
    pub transport: Arc<TransportHub>,
    /// Stops the producer, evaluator, sweep and heartbeat loops
    pub cancel: CancellationToken,
}

impl GatewayContext {
    /// Build the context and register both presence sources.
    pub fn new(
        config: GatewayConfig,
        clock: Arc<dyn Clock>,
        actuators: ActuatorArbiter,
        fanout: Arc<EventFanout>,
        transport: Arc<TransportHub>,
    ) -> Self {
        let presence = PresenceTracker::new(config.presence.timeout());
        presence.register(&config.presence.sensor_source);
        presence.register(&config.presence.gateway_source);

        Self {
            evaluator: FusionEvaluator::from_config(&config.fusion),
            store: SnapshotStore::new(),
            presence,
            config,
            clock,
            actuators,
            fanout,
            transport,
            cancel: CancellationToken::new(),
        }
    }

    pub fn now(&self) -> Instant {
        self.clock.now()
    }

    pub fn sensor_source(&self) -> &str {
        &self.config.presence.sensor_source
    }

    pub fn gateway_source(&self) -> &str {
        &self.config.presence.gateway_source
    }

    /// Gateway processing flag (`pi/control`).
    pub fn processing_enabled(&self) -> bool {
        self.presence.control_enabled(self.gateway_source())
    }

    pub fn device_status(&self) -> DeviceStatusReport {
        DeviceStatusReport {
            sensor_online: self.presence.is_online(self.sensor_source()),
            gateway_online: self.presence.is_online(self.gateway_source()),
            sensor_control: self.presence.control_enabled(self.sensor_source()),
            gateway_control: self.processing_enabled(),
        }
    }

    /// Publish the current `device_status` event.
    pub fn publish_device_status(&self) {
        let report = self.fanout.publish(&GatewayEvent::DeviceStatus(self.device_status()));
        debug!(delivered = report.delivered, "device status published");
    }

    /// Publish `device_status` if any presence transition occurred.
    pub fn announce<I>(&self, events: I)
    where
        I: IntoIterator<Item = PresenceEvent>,
    {
        if events.into_iter().count() > 0 {
            self.publish_device_status();
        }
    }
}
