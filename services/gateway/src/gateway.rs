//! Gateway lifecycle.
//!
//! [`Gateway::start`] binds the sockets, opens the sample store and spawns
//! every loop. [`Gateway::shutdown`] stops them in order: loops first,
//! then the actuators go to the safe state, then the retained offline flag
//! is published, then the servers close and the sample queue is flushed.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use vigil_actuation::{ActuatorArbiter, AlertPort, LoggingAlertPort, LoggingSwitchPort, SwitchPort};
use vigil_core::config::ActuatorConfig;
use vigil_core::{Clock, GatewayConfig, TokioClock};
use vigil_fanout::{EventFanout, GatewayEvent, LiveFeedServer, PersistenceSink, SampleStore};

use crate::backoff::BackoffPolicy;
use crate::context::GatewayContext;
use crate::error::GatewayError;
use crate::evaluator::run_evaluator;
use crate::heartbeat::{publish_offline, run_heartbeat};
use crate::inputs::{run_input, ValueFileInput};
use crate::router::run_router;
use crate::sweeper::run_presence_sweep;
use crate::transport::{TransportHub, TransportMessage, TransportServer, TransportSink};

const PERSIST_QUEUE: usize = 256;

/// Hardware drivers for the actuators.
pub struct GatewayPorts {
    pub alert: Box<dyn AlertPort>,
    pub switch: Box<dyn SwitchPort>,
}

impl GatewayPorts {
    /// Drivers that only log what they would do.
    pub fn dry_run(config: &ActuatorConfig) -> Self {
        Self {
            alert: Box::new(LoggingAlertPort::new(config)),
            switch: Box::new(LoggingSwitchPort::new(config)),
        }
    }
}

type Task = (&'static str, JoinHandle<()>);

/// A running gateway.
pub struct Gateway {
    ctx: Arc<GatewayContext>,
    io_cancel: CancellationToken,
    loops: Vec<Task>,
    servers: Vec<Task>,
    persistence: Option<Arc<PersistenceSink>>,
    inbound: mpsc::Sender<TransportMessage>,
    transport_addr: SocketAddr,
    live_feed_addr: Option<SocketAddr>,
}

impl Gateway {
    pub async fn start(config: GatewayConfig, ports: GatewayPorts) -> Result<Self, GatewayError> {
        Self::start_with_clock(config, ports, Arc::new(TokioClock)).await
    }

    /// Start with an explicit clock for the presence and hysteresis timing.
    pub async fn start_with_clock(
        config: GatewayConfig,
        ports: GatewayPorts,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, GatewayError> {
        let fanout = Arc::new(EventFanout::new());
        let hub = Arc::new(TransportHub::new(config.transport.inbound_capacity));
        let (inbound_tx, inbound_rx) = mpsc::channel(config.transport.inbound_capacity);

        // Everything fallible happens before the first task is spawned.
        let transport =
            TransportServer::bind(config.transport.listen_addr, Arc::clone(&hub), inbound_tx.clone())
                .await?;
        let transport_addr = transport.local_addr()?;

        let live_feed = if config.live_feed.enabled {
            Some(
                LiveFeedServer::bind(
                    config.live_feed.bind_addr,
                    Arc::clone(&fanout),
                    config.live_feed.subscriber_capacity,
                )
                .await?,
            )
        } else {
            None
        };
        let live_feed_addr = match &live_feed {
            Some(server) => Some(server.local_addr()?),
            None => None,
        };

        let persistence = if config.persistence.enabled {
            let store = SampleStore::open(&config.persistence.db_path)?;
            info!(path = %config.persistence.db_path.display(), "sample store opened");
            Some(Arc::new(PersistenceSink::spawn(store, PERSIST_QUEUE)?))
        } else {
            None
        };

        let actuators = ActuatorArbiter::spawn(ports.alert, ports.switch, &config.actuators);
        let ctx = Arc::new(GatewayContext::new(
            config,
            clock,
            actuators,
            Arc::clone(&fanout),
            Arc::clone(&hub),
        ));

        if let Some(sink) = &persistence {
            fanout.register(sink.clone());
        }
        fanout.register(Arc::new(TransportSink::new(
            Arc::clone(&hub),
            ctx.config.topics.events.clone(),
        )));

        let io_cancel = CancellationToken::new();
        let mut servers: Vec<Task> = vec![("transport", tokio::spawn(transport.run(io_cancel.clone())))];
        if let Some(server) = live_feed {
            let greeting_ctx = Arc::clone(&ctx);
            let server = server.with_greeting(Arc::new(move || {
                Some(GatewayEvent::DeviceStatus(greeting_ctx.device_status()))
            }));
            servers.push(("live_feed", tokio::spawn(server.run(io_cancel.clone()))));
        }

        let mut loops: Vec<Task> = vec![
            ("router", tokio::spawn(run_router(Arc::clone(&ctx), inbound_rx))),
            ("evaluator", tokio::spawn(run_evaluator(Arc::clone(&ctx)))),
            ("presence_sweep", tokio::spawn(run_presence_sweep(Arc::clone(&ctx)))),
            ("heartbeat", tokio::spawn(run_heartbeat(Arc::clone(&ctx)))),
        ];
        for input in &ctx.config.inputs {
            info!(input = %input.name, path = %input.path.display(), channel = ?input.channel, "polling local input");
            loops.push((
                "input",
                tokio::spawn(run_input(
                    Arc::clone(&ctx),
                    Box::new(ValueFileInput::new(input)),
                    input.channel,
                    input.poll_interval(),
                    BackoffPolicy::default(),
                )),
            ));
        }

        info!(
            transport = %transport_addr,
            live_feed = ?live_feed_addr,
            policy = ?ctx.evaluator.policy(),
            "gateway started"
        );

        Ok(Self {
            ctx,
            io_cancel,
            loops,
            servers,
            persistence,
            inbound: inbound_tx,
            transport_addr,
            live_feed_addr,
        })
    }

    pub fn context(&self) -> &Arc<GatewayContext> {
        &self.ctx
    }

    pub fn transport_addr(&self) -> SocketAddr {
        self.transport_addr
    }

    pub fn live_feed_addr(&self) -> Option<SocketAddr> {
        self.live_feed_addr
    }

    /// Sender into the inbound queue, bypassing the socket.
    pub fn inbound(&self) -> mpsc::Sender<TransportMessage> {
        self.inbound.clone()
    }

    /// Stop everything and leave the actuators safe.
    pub async fn shutdown(self) {
        info!("gateway shutting down");
        self.ctx.cancel.cancel();
        join_all(self.loops).await;

        self.ctx.actuators.shutdown().await;
        publish_offline(&self.ctx);

        self.io_cancel.cancel();
        join_all(self.servers).await;

        if let Some(sink) = self.persistence {
            if let Err(e) = tokio::task::spawn_blocking(move || sink.close()).await {
                warn!(error = %e, "persistence flush task failed");
            }
        }
        info!("gateway stopped");
    }
}

async fn join_all(tasks: Vec<Task>) {
    for (name, task) in tasks {
        if let Err(e) = task.await {
            warn!(task = name, error = %e, "task ended abnormally");
        }
    }
}
