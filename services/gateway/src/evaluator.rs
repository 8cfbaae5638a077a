//! Evaluator loop
//!
//! Once per tick: read the snapshot, fuse it, run it through the alert
//! controller, hand the held status to the actuators and publish a
//! `sensor_data` event. This loop is the only owner of the controller.

use std::sync::Arc;

use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

use vigil_core::{Instant, SafetyStatus};
use vigil_fanout::{wall_clock_now, GatewayEvent, SensorReport};
use vigil_fusion::{AlertController, AlertStep};

use crate::context::GatewayContext;

/// Result of one evaluator tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TickOutcome {
    /// Gateway processing is disabled
    Skipped,
    Evaluated(AlertStep),
}

impl TickOutcome {
    /// Held status, if the tick evaluated.
    pub fn status(&self) -> Option<SafetyStatus> {
        match self {
            TickOutcome::Skipped => None,
            TickOutcome::Evaluated(step) => Some(step.status),
        }
    }
}

/// Run one evaluation at `now`.
pub fn tick(ctx: &GatewayContext, controller: &mut AlertController, now: Instant) -> TickOutcome {
    if !ctx.processing_enabled() {
        if controller.current() != SafetyStatus::Normal || controller.hold_until().is_some() {
            controller.reset();
            debug!("processing disabled; alert state cleared");
        }
        return TickOutcome::Skipped;
    }

    let snapshot = ctx.store.read();
    let raw = ctx.evaluator.evaluate(&snapshot);
    let step = controller.step(raw, now);

    if step.changed() {
        info!(from = %step.previous, to = %step.status, raw = %raw, "safety status changed");
    } else {
        debug!(status = %step.status, raw = %raw, "tick");
    }

    ctx.actuators.apply(step.status);

    let report = SensorReport::new(
        wall_clock_now(),
        &snapshot,
        step.status,
        ctx.presence.is_online(ctx.sensor_source()),
        true,
    );
    ctx.fanout.publish(&GatewayEvent::SensorData(report));

    TickOutcome::Evaluated(step)
}

/// Tick until cancelled.
pub async fn run_evaluator(ctx: Arc<GatewayContext>) {
    let mut controller = AlertController::new(ctx.config.evaluator.alert_hold());
    let mut ticker = interval(ctx.config.evaluator.tick());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ctx.cancel.cancelled() => break,
            _ = ticker.tick() => {
                tick(&ctx, &mut controller, ctx.now());
            }
        }
    }
    debug!("evaluator stopped");
}
