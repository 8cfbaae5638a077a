//! Switch commands and shutdown ordering through the router.

use std::sync::Arc;
use std::time::Duration;

use vigil_actuation::SwitchPosition;
use vigil_core::{SafetyStatus, TokioClock};
use vigil_gateway::{route, TransportMessage};

use crate::test_utils::{init_tracing, test_config, test_context, within, HwCall};

const SETTLE: Duration = Duration::from_millis(200);

#[tokio::test]
async fn test_concurrent_on_requests_move_once() {
    init_tracing();
    let tc = test_context(test_config(), Arc::new(TokioClock), SETTLE).await;

    route(&tc.ctx, &TransportMessage::new("pi/servo", "on"));
    route(&tc.ctx, &TransportMessage::new("pi/servo", "ON"));
    tokio::time::sleep(Duration::from_millis(20)).await;
    route(&tc.ctx, &TransportMessage::new("pi/servo", "1"));

    within(Duration::from_secs(5), tc.ctx.actuators.settled()).await;
    assert_eq!(tc.hw.switch_moves(), vec![SwitchPosition::On]);
    assert_eq!(tc.ctx.actuators.state().switch_position, SwitchPosition::On);
}

#[tokio::test]
async fn test_requests_during_move_coalesce_to_latest() {
    init_tracing();
    let tc = test_context(test_config(), Arc::new(TokioClock), SETTLE).await;

    route(&tc.ctx, &TransportMessage::new("pi/servo", "on"));
    tokio::time::sleep(Duration::from_millis(20)).await;
    // Move to On is in flight; Off then On again leaves On as the target.
    route(&tc.ctx, &TransportMessage::new("pi/servo", "off"));
    route(&tc.ctx, &TransportMessage::new("pi/servo", "on"));

    within(Duration::from_secs(5), tc.ctx.actuators.settled()).await;
    assert_eq!(tc.hw.switch_moves(), vec![SwitchPosition::On]);
}

#[tokio::test]
async fn test_shutdown_waits_for_move_then_goes_safe() {
    init_tracing();
    let tc = test_context(test_config(), Arc::new(TokioClock), SETTLE).await;

    tc.ctx.actuators.apply(SafetyStatus::Emergency);
    within(Duration::from_secs(5), tc.ctx.actuators.settled()).await;
    assert!(tc.ctx.actuators.state().alarm_on);

    route(&tc.ctx, &TransportMessage::new("pi/servo", "on"));
    tokio::time::sleep(Duration::from_millis(20)).await;
    within(Duration::from_secs(5), tc.ctx.actuators.shutdown()).await;

    let calls = tc.hw.calls();
    let moved = calls
        .iter()
        .position(|call| *call == HwCall::Switch(SwitchPosition::On))
        .expect("switch move completed");
    let alarm_off = calls
        .iter()
        .rposition(|call| matches!(call, HwCall::Alarm { on: false, .. }))
        .expect("alarm forced off");
    assert!(moved < alarm_off);

    let state = tc.ctx.actuators.state();
    assert!(!state.indicator_on);
    assert!(!state.alarm_on);
    assert_eq!(state.switch_position, SwitchPosition::On);

    // Requests after shutdown are ignored.
    route(&tc.ctx, &TransportMessage::new("pi/servo", "off"));
    tokio::time::sleep(SETTLE * 2).await;
    assert_eq!(tc.hw.switch_moves(), vec![SwitchPosition::On]);
}
