//! Inbound message → snapshot → fusion → hysteresis → actuators.
//!
//! Time is driven by a [`ManualClock`]; the evaluator is stepped directly
//! with `tick` so every transition lands on an exact instant.

use std::sync::Arc;
use std::time::Duration;

use vigil_core::{FusionPolicy, ManualClock, SafetyStatus};
use vigil_fusion::AlertController;
use vigil_gateway::{route, tick, TickOutcome, TransportMessage};

use crate::test_utils::{init_tracing, test_config, test_context, HwCall, TestContext};

const SECOND: Duration = Duration::from_secs(1);

async fn setup() -> (TestContext, Arc<ManualClock>, AlertController) {
    init_tracing();
    let clock = Arc::new(ManualClock::new());
    let config = test_config();
    let controller = AlertController::new(config.evaluator.alert_hold());
    let tc = test_context(config, clock.clone(), Duration::ZERO).await;
    (tc, clock, controller)
}

fn send(tc: &TestContext, topic: &str, payload: &str) {
    route(&tc.ctx, &TransportMessage::new(topic, payload));
}

fn occupied(tc: &TestContext) {
    send(tc, "pi/occupancy", "1");
}

#[tokio::test]
async fn test_partial_messages_merge_into_snapshot() {
    let (tc, _clock, _) = setup().await;

    send(&tc, "esp32/data", r#"{"temperature": 25.0}"#);
    send(&tc, "esp32/data", r#"{"humidity": 50.0}"#);

    let snapshot = tc.ctx.store.read();
    assert_eq!(snapshot.temperature, Some(25.0));
    assert_eq!(snapshot.humidity, Some(50.0));
    assert!(!snapshot.button);

    // First data message brings the sensor online exactly once.
    assert!(tc.ctx.presence.is_online("sensor-node"));
    let statuses = tc.sink.device_statuses();
    assert_eq!(statuses.len(), 1);
    assert!(statuses[0].sensor_online);
}

#[tokio::test]
async fn test_malformed_payload_changes_nothing() {
    let (tc, _clock, _) = setup().await;
    send(&tc, "esp32/data", r#"{"temperature": 21.0}"#);
    let before = tc.ctx.store.read();

    send(&tc, "esp32/data", "{not json");
    send(&tc, "esp32/data", r#"{"temperature": "hot"}"#);
    send(&tc, "pi/servo", "sideways");

    assert_eq!(tc.ctx.store.read(), before);
    tc.ctx.actuators.settled().await;
    assert!(tc.hw.switch_moves().is_empty());
}

#[tokio::test]
async fn test_emergency_held_then_released() {
    let (tc, clock, mut controller) = setup().await;
    occupied(&tc);
    let t0 = tc.ctx.now();

    send(&tc, "esp32/data", r#"{"buttonPressed": 1}"#);
    assert_eq!(tick(&tc.ctx, &mut controller, t0).status(), Some(SafetyStatus::Emergency));

    send(&tc, "esp32/data", r#"{"buttonPressed": 0}"#);
    let mut held = Vec::new();
    for _ in 0..3 {
        clock.advance(SECOND);
        held.push(tick(&tc.ctx, &mut controller, tc.ctx.now()).status().unwrap());
    }
    assert_eq!(
        held,
        vec![SafetyStatus::Emergency, SafetyStatus::Emergency, SafetyStatus::Normal]
    );
    assert_eq!(
        tc.sink.sensor_statuses(),
        vec![
            SafetyStatus::Emergency,
            SafetyStatus::Emergency,
            SafetyStatus::Emergency,
            SafetyStatus::Normal
        ]
    );
}

#[tokio::test]
async fn test_escalation_bypasses_hold() {
    let (tc, clock, mut controller) = setup().await;
    occupied(&tc);
    let t0 = tc.ctx.now();

    send(&tc, "pi/sound", "1");
    assert_eq!(tick(&tc.ctx, &mut controller, t0).status(), Some(SafetyStatus::Warning));
    assert_eq!(controller.hold_until(), Some(t0 + 3 * SECOND));

    clock.advance(SECOND);
    send(&tc, "esp32/data", r#"{"abnormalMovement": true}"#);
    let outcome = tick(&tc.ctx, &mut controller, tc.ctx.now());
    assert_eq!(outcome.status(), Some(SafetyStatus::Emergency));
    assert_eq!(controller.hold_until(), Some(t0 + 4 * SECOND));
}

#[tokio::test]
async fn test_absent_person_warns_unless_policy_escalates() {
    let (tc, _clock, mut controller) = setup().await;
    let now = tc.ctx.now();
    assert_eq!(tick(&tc.ctx, &mut controller, now).status(), Some(SafetyStatus::Warning));

    let mut config = test_config();
    config.fusion.policy = FusionPolicy::AbsenceEmergency;
    let strict = test_context(config, Arc::new(ManualClock::new()), Duration::ZERO).await;
    let mut strict_controller = AlertController::new(SECOND);
    let now = strict.ctx.now();
    assert_eq!(
        tick(&strict.ctx, &mut strict_controller, now).status(),
        Some(SafetyStatus::Emergency)
    );
}

#[tokio::test]
async fn test_steady_status_sends_one_command_per_actuator() {
    let (tc, clock, mut controller) = setup().await;
    occupied(&tc);
    let startup_calls = tc.hw.len();

    send(&tc, "esp32/data", r#"{"buttonPressed": 1}"#);
    for _ in 0..5 {
        tick(&tc.ctx, &mut controller, tc.ctx.now());
        tc.ctx.actuators.settled().await;
        clock.advance(SECOND);
    }

    let calls = tc.hw.calls()[startup_calls..].to_vec();
    assert_eq!(
        calls,
        vec![
            HwCall::Indicator(true),
            HwCall::Alarm {
                on: true,
                intensity: 75
            }
        ]
    );
    let state = tc.ctx.actuators.state();
    assert!(state.indicator_on);
    assert!(state.alarm_on);
    assert_eq!(state.alarm_intensity, 75);
}

#[tokio::test]
async fn test_warning_lights_indicator_only() {
    let (tc, _clock, mut controller) = setup().await;
    occupied(&tc);
    send(&tc, "pi/sound", "true");

    tick(&tc.ctx, &mut controller, tc.ctx.now());
    tc.ctx.actuators.settled().await;

    let state = tc.ctx.actuators.state();
    assert!(state.indicator_on);
    assert!(!state.alarm_on);
}

#[tokio::test]
async fn test_processing_disable_skips_and_forces_outputs_off() {
    let (tc, clock, mut controller) = setup().await;
    occupied(&tc);
    send(&tc, "esp32/data", r#"{"buttonPressed": 1}"#);
    tick(&tc.ctx, &mut controller, tc.ctx.now());
    tc.ctx.actuators.settled().await;
    assert!(tc.ctx.actuators.state().alarm_on);

    tc.sink.clear();
    send(&tc, "pi/control", "false");
    tc.ctx.actuators.settled().await;
    clock.advance(SECOND);

    assert_eq!(tick(&tc.ctx, &mut controller, tc.ctx.now()), TickOutcome::Skipped);
    assert_eq!(controller.current(), SafetyStatus::Normal);
    assert!(tc.sink.sensor_statuses().is_empty());
    let device = tc.sink.device_statuses();
    assert_eq!(device.len(), 1);
    assert!(!device[0].gateway_control);

    let state = tc.ctx.actuators.state();
    assert!(!state.indicator_on);
    assert!(!state.alarm_on);

    // Re-enabling resumes evaluation from a clean controller.
    send(&tc, "pi/control", "true");
    send(&tc, "esp32/data", r#"{"buttonPressed": 0}"#);
    clock.advance(SECOND);
    assert_eq!(
        tick(&tc.ctx, &mut controller, tc.ctx.now()).status(),
        Some(SafetyStatus::Normal)
    );
}
