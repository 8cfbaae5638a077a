//! Shared fixtures: recording actuator ports, a recording event sink and
//! a context builder wired to a manual clock.

use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use vigil_actuation::{ActuatorArbiter, ActuatorResult, AlertPort, SwitchPort, SwitchPosition};
use vigil_core::{Clock, GatewayConfig, SafetyStatus};
use vigil_fanout::{
    Delivery, DeviceStatusReport, EventFanout, EventSink, GatewayEvent, SinkError,
};
use vigil_gateway::{GatewayContext, GatewayPorts, TransportHub};

/// Initialize test logging once; `RUST_LOG` controls verbosity.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// ── Hardware call record ──────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum HwCall {
    Indicator(bool),
    Alarm { on: bool, intensity: u8 },
    Switch(SwitchPosition),
}

/// Shared, ordered log of hardware calls.
#[derive(Debug, Clone, Default)]
pub struct HwLog(Arc<Mutex<Vec<HwCall>>>);

#[allow(dead_code)]
impl HwLog {
    fn push(&self, call: HwCall) {
        self.0.lock().unwrap().push(call);
    }

    pub fn calls(&self) -> Vec<HwCall> {
        self.0.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.0.lock().unwrap().len()
    }

    pub fn switch_moves(&self) -> Vec<SwitchPosition> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                HwCall::Switch(position) => Some(position),
                _ => None,
            })
            .collect()
    }

    pub fn indicator_calls(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, HwCall::Indicator(_)))
            .count()
    }

    pub fn alarm_calls(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, HwCall::Alarm { .. }))
            .count()
    }
}

pub struct MockAlertPort {
    log: HwLog,
}

impl AlertPort for MockAlertPort {
    fn set_indicator(&mut self, on: bool) -> ActuatorResult<()> {
        self.log.push(HwCall::Indicator(on));
        Ok(())
    }

    fn set_alarm(&mut self, on: bool, intensity: u8) -> ActuatorResult<()> {
        self.log.push(HwCall::Alarm { on, intensity });
        Ok(())
    }
}

/// Switch that takes `settle` to move. Runs on the blocking pool.
pub struct MockSwitchPort {
    log: HwLog,
    settle: Duration,
}

impl SwitchPort for MockSwitchPort {
    fn move_to(&mut self, position: SwitchPosition) -> ActuatorResult<()> {
        std::thread::sleep(self.settle);
        self.log.push(HwCall::Switch(position));
        Ok(())
    }
}

/// Recording ports sharing one log.
pub fn mock_ports(switch_settle: Duration) -> (GatewayPorts, HwLog) {
    let log = HwLog::default();
    let ports = GatewayPorts {
        alert: Box::new(MockAlertPort { log: log.clone() }),
        switch: Box::new(MockSwitchPort {
            log: log.clone(),
            settle: switch_settle,
        }),
    };
    (ports, log)
}

// ── Recording sink ────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<GatewayEvent>>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn events(&self) -> Vec<GatewayEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.events.lock().unwrap().clear();
    }

    pub fn sensor_statuses(&self) -> Vec<SafetyStatus> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                GatewayEvent::SensorData(report) => Some(report.status),
                _ => None,
            })
            .collect()
    }

    pub fn device_statuses(&self) -> Vec<DeviceStatusReport> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                GatewayEvent::DeviceStatus(report) => Some(report),
                _ => None,
            })
            .collect()
    }
}

impl EventSink for RecordingSink {
    fn name(&self) -> &str {
        "recording"
    }

    fn deliver(&self, event: &GatewayEvent) -> Result<Delivery, SinkError> {
        self.events.lock().unwrap().push(event.clone());
        Ok(Delivery::Delivered)
    }
}

// ── Context fixtures ──────────────────────────────────────────

/// Config bound to loopback ephemeral ports with persistence off.
pub fn test_config() -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.transport.listen_addr = "127.0.0.1:0".parse().unwrap();
    config.live_feed.bind_addr = "127.0.0.1:0".parse().unwrap();
    config.live_feed.enabled = false;
    config.persistence.enabled = false;
    config
}

pub struct TestContext {
    pub ctx: Arc<GatewayContext>,
    pub hw: HwLog,
    pub sink: Arc<RecordingSink>,
}

/// Context with mock ports and a recording sink, driven by `clock`.
/// Loops are not started; tests call `route`, `tick` and `sweep` directly.
/// Must run inside a tokio runtime.
pub async fn test_context(
    config: GatewayConfig,
    clock: Arc<dyn Clock>,
    switch_settle: Duration,
) -> TestContext {
    let (ports, hw) = mock_ports(switch_settle);
    let actuators = ActuatorArbiter::spawn(ports.alert, ports.switch, &config.actuators);
    let fanout = Arc::new(EventFanout::new());
    let sink = Arc::new(RecordingSink::default());
    fanout.register(sink.clone());
    let hub = Arc::new(TransportHub::new(16));

    let ctx = Arc::new(GatewayContext::new(config, clock, actuators, fanout, hub));
    ctx.actuators.settled().await;
    TestContext { ctx, hw, sink }
}

/// Poll `condition` every 10 ms until it holds or `timeout` elapses.
pub async fn wait_until<F>(timeout: Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

/// Fail the test if `fut` takes longer than `timeout`.
pub async fn within<F: Future>(timeout: Duration, fut: F) -> F::Output {
    tokio::time::timeout(timeout, fut)
        .await
        .expect("operation timed out")
}
