//! Full gateway over real sockets: line transport in, live feed and
//! sample store out, clean shutdown.

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::tcp::OwnedReadHalf;
use tokio::net::TcpStream;
use tokio_tungstenite::connect_async;

use vigil_core::config::{InputChannel, InputConfig};
use vigil_core::{GatewayConfig, SafetyStatus, TokioClock};
use vigil_fanout::{GatewayEvent, SampleStore};
use vigil_gateway::inputs::{run_input, ValueFileInput};
use vigil_gateway::{BackoffPolicy, Gateway};

use crate::test_utils::{
    init_tracing, mock_ports, test_config, test_context, wait_until, within,
};

const TIMEOUT: Duration = Duration::from_secs(5);

fn fast_config(db_path: std::path::PathBuf) -> GatewayConfig {
    let mut config = test_config();
    config.evaluator.tick_ms = 50;
    config.evaluator.alert_hold_ms = 200;
    config.live_feed.enabled = true;
    config.persistence.enabled = true;
    config.persistence.db_path = db_path;
    config
}

async fn next_line_matching<F>(lines: &mut Lines<BufReader<OwnedReadHalf>>, pred: F) -> String
where
    F: Fn(&str) -> bool,
{
    within(TIMEOUT, async {
        loop {
            let line = lines.next_line().await.unwrap().expect("transport closed");
            if pred(&line) {
                return line;
            }
        }
    })
    .await
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_end_to_end_alarm_live_feed_and_shutdown() {
    init_tracing();
    let dir = std::env::temp_dir().join(format!("vigil-e2e-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let db_path = dir.join("samples.db");
    let _ = std::fs::remove_file(&db_path);

    let (ports, hw) = mock_ports(Duration::from_millis(50));
    let gateway = Gateway::start(fast_config(db_path.clone()), ports).await.unwrap();
    let ctx = gateway.context().clone();

    // Sensor node connects and receives the retained gateway status.
    let stream = TcpStream::connect(gateway.transport_addr()).await.unwrap();
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();
    next_line_matching(&mut lines, |line| line == "pi/status true").await;

    writer.write_all(b"pi/occupancy 1\n").await.unwrap();
    writer
        .write_all(b"esp32/data {\"temperature\": 24.0, \"buttonPressed\": 1}\n")
        .await
        .unwrap();

    assert!(wait_until(TIMEOUT, || ctx.actuators.state().alarm_on).await);
    assert!(ctx.presence.is_online("sensor-node"));

    // Upstream republish carries the held status.
    let event_line = next_line_matching(&mut lines, |line| {
        line.starts_with("pi/events ") && line.contains("EMERGENCY")
    })
    .await;
    let event: GatewayEvent =
        serde_json::from_str(event_line.trim_start_matches("pi/events ")).unwrap();
    assert!(matches!(event, GatewayEvent::SensorData(ref r) if r.temperature == Some(24.0)));

    // Live subscriber is greeted with device status, then sees sensor data.
    let live_addr = gateway.live_feed_addr().unwrap();
    let (mut ws, _) = connect_async(format!("ws://{live_addr}")).await.unwrap();
    let greeting = within(TIMEOUT, ws.next()).await.unwrap().unwrap();
    let greeting: GatewayEvent = serde_json::from_str(greeting.to_text().unwrap()).unwrap();
    match greeting {
        GatewayEvent::DeviceStatus(status) => {
            assert!(status.sensor_online);
            assert!(status.gateway_online);
            assert!(status.gateway_control);
        }
        other => panic!("expected device status greeting, got {other:?}"),
    }
    let live = within(TIMEOUT, async {
        loop {
            let msg = ws.next().await.unwrap().unwrap();
            let event: GatewayEvent = serde_json::from_str(msg.to_text().unwrap()).unwrap();
            if let GatewayEvent::SensorData(report) = event {
                return report;
            }
        }
    })
    .await;
    assert_eq!(live.status, SafetyStatus::Emergency);

    // Switch command over the transport.
    writer.write_all(b"pi/servo on\n").await.unwrap();
    assert!(wait_until(TIMEOUT, || hw.switch_moves().len() == 1).await);

    within(TIMEOUT, gateway.shutdown()).await;

    let state = ctx.actuators.state();
    assert!(!state.indicator_on);
    assert!(!state.alarm_on);
    assert_eq!(ctx.transport.retained("pi/status").as_deref(), Some("false"));
    next_line_matching(&mut lines, |line| line == "pi/status false").await;

    let store = SampleStore::open(&db_path).unwrap();
    assert!(store.count().unwrap() > 0);
    assert!(store
        .history(100)
        .unwrap()
        .iter()
        .any(|sample| sample.button && sample.status == SafetyStatus::Emergency));

    let _ = std::fs::remove_dir_all(&dir);
}

#[tokio::test]
async fn test_injected_messages_reach_router() {
    init_tracing();
    let mut config = test_config();
    config.evaluator.tick_ms = 20;
    let (ports, _hw) = mock_ports(Duration::ZERO);
    let gateway = Gateway::start(config, ports).await.unwrap();

    gateway
        .inbound()
        .send(vigil_gateway::TransportMessage::new("pi/sound", "1"))
        .await
        .unwrap();
    let ctx = gateway.context().clone();
    assert!(wait_until(TIMEOUT, || ctx.store.read().sound_alert).await);

    gateway.shutdown().await;
}

#[tokio::test]
async fn test_input_poller_tracks_value_file() {
    init_tracing();
    let path = std::env::temp_dir().join(format!("vigil-mic-{}", std::process::id()));
    std::fs::write(&path, "1\n").unwrap();

    let tc = test_context(test_config(), Arc::new(TokioClock), Duration::ZERO).await;
    let source = ValueFileInput::new(&InputConfig {
        name: "mic".into(),
        path: path.clone(),
        channel: InputChannel::Sound,
        poll_ms: 10,
        active_high: true,
    });
    let poller = tokio::spawn(run_input(
        Arc::clone(&tc.ctx),
        Box::new(source),
        InputChannel::Sound,
        Duration::from_millis(10),
        BackoffPolicy::default(),
    ));

    assert!(wait_until(TIMEOUT, || tc.ctx.store.read().sound_alert).await);
    std::fs::write(&path, "0\n").unwrap();
    assert!(wait_until(TIMEOUT, || !tc.ctx.store.read().sound_alert).await);

    tc.ctx.cancel.cancel();
    within(TIMEOUT, poller).await.unwrap();
    let _ = std::fs::remove_file(&path);
}
