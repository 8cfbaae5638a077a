//! WebSocket live feed
//!
//! Every connected client is registered with the [`EventFanout`] as a
//! [`ChannelSink`] for the lifetime of its connection, so it receives each
//! published event as a JSON text frame. A new client is greeted with the
//! current device status before the first event arrives.

use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::LiveFeedError;
use crate::event::GatewayEvent;
use crate::sink::{ChannelSink, EventFanout};

/// Produces the event sent to a client right after it connects.
pub type Greeting = Arc<dyn Fn() -> Option<GatewayEvent> + Send + Sync>;

/// WebSocket server for live subscribers.
pub struct LiveFeedServer {
    listener: TcpListener,
    fanout: Arc<EventFanout>,
    capacity: usize,
    greeting: Option<Greeting>,
}

impl LiveFeedServer {
    /// Bind the listening socket.
    pub async fn bind(
        addr: SocketAddr,
        fanout: Arc<EventFanout>,
        capacity: usize,
    ) -> Result<Self, LiveFeedError> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self {
            listener,
            fanout,
            capacity: capacity.max(1),
            greeting: None,
        })
    }

    /// Send `greeting()` to each new client.
    pub fn with_greeting(mut self, greeting: Greeting) -> Self {
        self.greeting = Some(greeting);
        self
    }

    /// Address actually bound (useful with port 0).
    pub fn local_addr(&self) -> Result<SocketAddr, LiveFeedError> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept clients until `cancel` fires.
    pub async fn run(self, cancel: CancellationToken) {
        match self.listener.local_addr() {
            Ok(addr) => info!("Live feed listening on ws://{}", addr),
            Err(e) => warn!(error = %e, "live feed address unavailable"),
        }

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer_addr)) => {
                        info!("New live feed connection from {}", peer_addr);
                        let fanout = Arc::clone(&self.fanout);
                        let greeting = self.greeting.clone();
                        let capacity = self.capacity;
                        let cancel = cancel.clone();
                        tokio::spawn(async move {
                            if let Err(e) =
                                handle_connection(stream, peer_addr, fanout, capacity, greeting, cancel).await
                            {
                                warn!("Live feed connection error from {}: {}", peer_addr, e);
                            }
                        });
                    }
                    Err(e) => {
                        error!("Failed to accept live feed connection: {}", e);
                    }
                },
            }
        }
        debug!("live feed stopped");
    }
}

async fn handle_connection(
    stream: TcpStream,
    peer_addr: SocketAddr,
    fanout: Arc<EventFanout>,
    capacity: usize,
    greeting: Option<Greeting>,
    cancel: CancellationToken,
) -> Result<(), LiveFeedError> {
    let ws_stream = accept_async(stream).await?;
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    let (sink, mut events) = ChannelSink::channel(format!("live:{peer_addr}"), capacity);
    let sink_id = fanout.register(Arc::new(sink));

    let result = async {
        if let Some(event) = greeting.as_ref().and_then(|g| g()) {
            ws_sender
                .send(Message::Text(serde_json::to_string(&event)?))
                .await?;
        }

        loop {
            tokio::select! {
                msg = ws_receiver.next() => match msg {
                    Some(Ok(Message::Text(text))) => {
                        debug!("Ignoring message from {}: {}", peer_addr, text);
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        info!("Live feed client {} disconnected", peer_addr);
                        break;
                    }
                    Some(Err(e)) => {
                        warn!("Error receiving from {}: {}", peer_addr, e);
                        break;
                    }
                    Some(Ok(_)) => {}
                },
                event = events.recv() => match event {
                    Some(event) => {
                        let json = serde_json::to_string(&event)?;
                        if let Err(e) = ws_sender.send(Message::Text(json)).await {
                            warn!("Error sending to {}: {}", peer_addr, e);
                            break;
                        }
                    }
                    None => break,
                },
                _ = cancel.cancelled() => {
                    let _ = ws_sender.send(Message::Close(None)).await;
                    break;
                }
            }
        }
        Ok::<(), LiveFeedError>(())
    }
    .await;

    fanout.unregister(sink_id);
    result
}
