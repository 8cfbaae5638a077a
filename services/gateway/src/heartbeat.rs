//! Gateway liveness heartbeat.
//!
//! Publishes the retained online flag on the gateway status topic and
//! counts as a liveness signal for the gateway's own presence source.

use std::sync::Arc;

use tokio::time::{interval, MissedTickBehavior};
use tracing::debug;

use vigil_core::flag_str;

use crate::context::GatewayContext;

/// Publish one heartbeat.
pub fn beat(ctx: &GatewayContext) {
    ctx.transport
        .publish(&ctx.config.topics.gateway_status, flag_str(true), true);
    ctx.announce(ctx.presence.touch(ctx.gateway_source(), ctx.now()));
}

/// Publish the retained offline flag.
pub fn publish_offline(ctx: &GatewayContext) {
    ctx.transport
        .publish(&ctx.config.topics.gateway_status, flag_str(false), true);
}

pub async fn run_heartbeat(ctx: Arc<GatewayContext>) {
    let mut ticker = interval(ctx.config.heartbeat.interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ctx.cancel.cancelled() => break,
            _ = ticker.tick() => beat(&ctx),
        }
    }
    debug!("heartbeat stopped");
}
