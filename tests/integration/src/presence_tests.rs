//! Device presence across the router, the sweep and the heartbeat.

use std::sync::Arc;
use std::time::Duration;

use vigil_core::{ManualClock, TokioClock};
use vigil_gateway::{route, TransportMessage};
use vigil_presence::{OfflineReason, PresenceEventKind};

use crate::test_utils::{init_tracing, test_config, test_context};

#[tokio::test]
async fn test_silence_beyond_timeout_produces_one_offline_event() {
    init_tracing();
    let clock = Arc::new(ManualClock::new());
    let tc = test_context(test_config(), clock.clone(), Duration::ZERO).await;

    route(&tc.ctx, &TransportMessage::new("esp32/data", r#"{"temperature": 20.0}"#));
    assert!(tc.ctx.presence.is_online("sensor-node"));

    clock.advance(Duration::from_secs(10));
    assert!(tc.ctx.presence.sweep(tc.ctx.now()).is_empty());

    clock.advance(Duration::from_millis(1));
    let events = tc.ctx.presence.sweep(tc.ctx.now());
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].source, "sensor-node");
    assert_eq!(events[0].kind, PresenceEventKind::Lost(OfflineReason::Timeout));

    clock.advance(Duration::from_secs(30));
    assert!(tc.ctx.presence.sweep(tc.ctx.now()).is_empty());
}

#[tokio::test]
async fn test_retained_status_reports_are_edge_triggered() {
    init_tracing();
    let tc = test_context(test_config(), Arc::new(ManualClock::new()), Duration::ZERO).await;

    for payload in ["true", "1", "true"] {
        route(&tc.ctx, &TransportMessage::new("esp32/status", payload));
    }
    for payload in ["false", "0"] {
        route(&tc.ctx, &TransportMessage::new("esp32/status", payload));
    }

    let online: Vec<bool> = tc
        .sink
        .device_statuses()
        .iter()
        .map(|status| status.sensor_online)
        .collect();
    assert_eq!(online, vec![true, false]);
}

#[tokio::test]
async fn test_sensor_control_flag_is_reported_and_republished() {
    init_tracing();
    let tc = test_context(test_config(), Arc::new(ManualClock::new()), Duration::ZERO).await;

    route(&tc.ctx, &TransportMessage::new("esp32/control", "false"));
    route(&tc.ctx, &TransportMessage::new("esp32/control", "0"));

    let statuses = tc.sink.device_statuses();
    assert_eq!(statuses.len(), 1);
    assert!(!statuses[0].sensor_control);
    assert!(statuses[0].gateway_control);
    assert_eq!(tc.ctx.transport.retained("esp32/control").as_deref(), Some("false"));
}

#[tokio::test(start_paused = true)]
async fn test_sweep_loop_announces_timeout() {
    init_tracing();
    let tc = test_context(test_config(), Arc::new(TokioClock), Duration::ZERO).await;
    let sweep = tokio::spawn(vigil_gateway::sweeper::run_presence_sweep(Arc::clone(&tc.ctx)));

    route(&tc.ctx, &TransportMessage::new("esp32/data", "{}"));
    assert!(tc.ctx.presence.is_online("sensor-node"));

    tokio::time::sleep(Duration::from_secs(9)).await;
    assert!(tc.ctx.presence.is_online("sensor-node"));

    // Timeout is 10 s and the sweep runs every 2 s.
    tokio::time::sleep(Duration::from_secs(4)).await;
    assert!(!tc.ctx.presence.is_online("sensor-node"));
    let last = tc.sink.device_statuses().pop().unwrap();
    assert!(!last.sensor_online);

    tc.ctx.cancel.cancel();
    sweep.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_heartbeat_keeps_gateway_online_and_retains_flag() {
    init_tracing();
    let tc = test_context(test_config(), Arc::new(TokioClock), Duration::ZERO).await;
    let heartbeat = tokio::spawn(vigil_gateway::heartbeat::run_heartbeat(Arc::clone(&tc.ctx)));
    let sweep = tokio::spawn(vigil_gateway::sweeper::run_presence_sweep(Arc::clone(&tc.ctx)));

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert!(tc.ctx.presence.is_online("gateway-node"));
    assert_eq!(tc.ctx.transport.retained("pi/status").as_deref(), Some("true"));
    assert_eq!(
        tc.sink
            .device_statuses()
            .iter()
            .filter(|status| status.gateway_online)
            .count(),
        1
    );

    tc.ctx.cancel.cancel();
    heartbeat.await.unwrap();
    sweep.await.unwrap();
}
