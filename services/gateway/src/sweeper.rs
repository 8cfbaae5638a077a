//! Presence sweep loop.

use std::sync::Arc;

use tokio::time::{interval, MissedTickBehavior};
use tracing::debug;

use crate::context::GatewayContext;

/// Flip silent sources offline every sweep interval and announce the
/// transitions as `device_status`.
pub async fn run_presence_sweep(ctx: Arc<GatewayContext>) {
    let mut ticker = interval(ctx.config.presence.sweep_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ctx.cancel.cancelled() => break,
            _ = ticker.tick() => {
                ctx.announce(ctx.presence.sweep(ctx.now()));
            }
        }
    }
    debug!("presence sweep stopped");
}
