//! Line-oriented transport adapter
//!
//! Minimal broker stand-in: clients connect over TCP and exchange
//! `<topic> <payload>` lines. Lines from clients are queued for the
//! router; gateway publications are written to every connected client.
//! Retained publications are replayed to each client when it connects.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use vigil_fanout::{Delivery, EventSink, GatewayEvent, SinkError};

use crate::error::TransportError;

/// One topic/payload pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportMessage {
    pub topic: String,
    pub payload: String,
}

impl TransportMessage {
    pub fn new(topic: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }

    /// Split a wire line at the first space. The payload may be empty.
    pub fn parse_line(line: &str) -> Result<Self, TransportError> {
        let line = line.trim_end_matches(['\r', '\n']);
        let (topic, payload) = line.split_once(' ').unwrap_or((line, ""));
        if topic.is_empty() {
            return Err(TransportError::MalformedLine(line.to_string()));
        }
        Ok(Self::new(topic, payload))
    }

    /// Wire form, newline-terminated. Embedded newlines are flattened.
    pub fn to_line(&self) -> String {
        format!("{} {}\n", self.topic, self.payload.replace(['\r', '\n'], " "))
    }
}

/// Outbound side of the transport: retained values plus live broadcast.
#[derive(Debug)]
pub struct TransportHub {
    retained: Mutex<BTreeMap<String, String>>,
    outbound: broadcast::Sender<TransportMessage>,
}

impl TransportHub {
    pub fn new(capacity: usize) -> Self {
        let (outbound, _) = broadcast::channel(capacity.max(1));
        Self {
            retained: Mutex::new(BTreeMap::new()),
            outbound,
        }
    }

    /// Publish to every connected client. A retained payload replaces the
    /// previous one for `topic` and is replayed to later clients.
    pub fn publish(&self, topic: &str, payload: impl Into<String>, retain: bool) {
        let message = TransportMessage::new(topic, payload);
        if retain {
            self.lock()
                .insert(message.topic.clone(), message.payload.clone());
        }
        // No connected client is not an error.
        let _ = self.outbound.send(message);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TransportMessage> {
        self.outbound.subscribe()
    }

    /// Retained payload for `topic`.
    pub fn retained(&self, topic: &str) -> Option<String> {
        self.lock().get(topic).cloned()
    }

    fn retained_messages(&self) -> Vec<TransportMessage> {
        self.lock()
            .iter()
            .map(|(topic, payload)| TransportMessage::new(topic.as_str(), payload.as_str()))
            .collect()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, String>> {
        self.retained.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// TCP listener feeding the inbound queue.
pub struct TransportServer {
    listener: TcpListener,
    hub: Arc<TransportHub>,
    inbound: mpsc::Sender<TransportMessage>,
}

impl TransportServer {
    pub async fn bind(
        addr: SocketAddr,
        hub: Arc<TransportHub>,
        inbound: mpsc::Sender<TransportMessage>,
    ) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self {
            listener,
            hub,
            inbound,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        Ok(self.listener.local_addr()?)
    }

    /// Serve clients until `cancel` fires. Pending outbound messages are
    /// flushed to each client before its connection closes.
    pub async fn run(self, cancel: CancellationToken) {
        match self.listener.local_addr() {
            Ok(addr) => info!("Transport listening on {}", addr),
            Err(e) => warn!(error = %e, "transport address unavailable"),
        }

        let mut clients = Vec::new();
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer_addr)) => {
                        info!("Transport client connected: {}", peer_addr);
                        let hub = Arc::clone(&self.hub);
                        let inbound = self.inbound.clone();
                        let cancel = cancel.clone();
                        clients.push(tokio::spawn(async move {
                            if let Err(e) = handle_client(stream, peer_addr, hub, inbound, cancel).await {
                                warn!("Transport client {} error: {}", peer_addr, e);
                            }
                        }));
                        clients.retain(|client| !client.is_finished());
                    }
                    Err(e) => error!("Failed to accept transport client: {}", e),
                },
            }
        }

        for client in clients {
            let _ = client.await;
        }
        debug!("transport stopped");
    }
}

async fn handle_client(
    stream: TcpStream,
    peer_addr: SocketAddr,
    hub: Arc<TransportHub>,
    inbound: mpsc::Sender<TransportMessage>,
    cancel: CancellationToken,
) -> Result<(), TransportError> {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();
    let mut outbound = hub.subscribe();

    for message in hub.retained_messages() {
        writer.write_all(message.to_line().as_bytes()).await?;
    }

    loop {
        tokio::select! {
            line = lines.next_line() => match line? {
                Some(line) if line.trim().is_empty() => {}
                Some(line) => match TransportMessage::parse_line(&line) {
                    Ok(message) => match inbound.try_send(message) {
                        Ok(()) => {}
                        Err(mpsc::error::TrySendError::Full(message)) => {
                            warn!(topic = %message.topic, "inbound queue full; message dropped");
                        }
                        Err(mpsc::error::TrySendError::Closed(_)) => break,
                    },
                    Err(e) => warn!("Dropping line from {}: {}", peer_addr, e),
                },
                None => {
                    info!("Transport client disconnected: {}", peer_addr);
                    break;
                }
            },
            message = outbound.recv() => match message {
                Ok(message) => writer.write_all(message.to_line().as_bytes()).await?,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "transport client {} lagging", peer_addr);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            _ = cancel.cancelled() => {
                while let Ok(message) = outbound.try_recv() {
                    writer.write_all(message.to_line().as_bytes()).await?;
                }
                let _ = writer.shutdown().await;
                break;
            }
        }
    }
    Ok(())
}

/// Republishes gateway events as JSON on one transport topic.
pub struct TransportSink {
    hub: Arc<TransportHub>,
    topic: String,
}

impl TransportSink {
    pub fn new(hub: Arc<TransportHub>, topic: impl Into<String>) -> Self {
        Self {
            hub,
            topic: topic.into(),
        }
    }
}

impl EventSink for TransportSink {
    fn name(&self) -> &str {
        "transport"
    }

    fn deliver(&self, event: &GatewayEvent) -> Result<Delivery, SinkError> {
        let json = serde_json::to_string(event)?;
        self.hub.publish(&self.topic, json, false);
        Ok(Delivery::Delivered)
    }
}
