//! Inbound router task.
//!
//! Consumes the inbound queue and applies each decoded command to the
//! store, the presence tracker or the actuators. Runs no fusion itself.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use vigil_core::{flag_str, SensorUpdate};

use crate::context::GatewayContext;
use crate::inbound::{decode, InboundCommand};
use crate::transport::TransportMessage;

/// Decode and apply one inbound message. Malformed messages are logged
/// and dropped without touching any state.
pub fn route(ctx: &GatewayContext, msg: &TransportMessage) {
    match decode(&ctx.config.topics, msg) {
        Ok(command) => apply(ctx, command),
        Err(e) => warn!(topic = %msg.topic, error = %e, "dropping inbound message"),
    }
}

fn apply(ctx: &GatewayContext, command: InboundCommand) {
    let now = ctx.now();
    match command {
        InboundCommand::SensorData(update) => {
            if !ctx.store.update(&update, now) {
                debug!("sensor message carried no fields");
            }
            ctx.announce(ctx.presence.touch(ctx.sensor_source(), now));
        }
        InboundCommand::SensorStatus(online) => {
            ctx.announce(ctx.presence.report(ctx.sensor_source(), online, now));
        }
        InboundCommand::SensorControl(enabled) => {
            let changed = ctx
                .presence
                .set_control_enabled(ctx.sensor_source(), enabled);
            if changed.is_some() {
                ctx.transport
                    .publish(&ctx.config.topics.sensor_control, flag_str(enabled), true);
            }
            ctx.announce(changed);
        }
        InboundCommand::GatewayControl(enabled) => {
            ctx.actuators.set_enabled(enabled);
            let changed = ctx
                .presence
                .set_control_enabled(ctx.gateway_source(), enabled);
            if changed.is_some() {
                info!(
                    enabled,
                    "gateway processing {}",
                    if enabled { "enabled" } else { "disabled" }
                );
            }
            ctx.announce(changed);
        }
        InboundCommand::Switch(position) => {
            info!(%position, "switch command received");
            ctx.actuators.request_switch(position);
        }
        InboundCommand::Sound(active) => {
            ctx.store.update(&SensorUpdate::sound(active), now);
        }
        InboundCommand::Occupancy(present) => {
            ctx.store.update(&SensorUpdate::occupancy(present), now);
        }
        InboundCommand::GatewayStatus(online) => {
            debug!(online, "own status echoed");
        }
    }
}

/// Route inbound messages until cancelled or the queue closes.
pub async fn run_router(ctx: Arc<GatewayContext>, mut inbound: mpsc::Receiver<TransportMessage>) {
    loop {
        tokio::select! {
            _ = ctx.cancel.cancelled() => break,
            msg = inbound.recv() => match msg {
                Some(msg) => route(&ctx, &msg),
                None => break,
            },
        }
    }
    debug!("router stopped");
}
