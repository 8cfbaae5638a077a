//! Best-effort event fan-out.
//!
//! Sinks register with [`EventFanout`] and receive every published event.
//! Delivery happens outside the registry lock, so sinks can come and go
//! while a publish is in progress. A sink whose delivery fails is pruned.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard, PoisonError};

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::error::SinkError;
use crate::event::GatewayEvent;

/// Registry handle for a sink.
pub type SinkId = u64;

/// Outcome of a successful delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Event handed to the sink
    Delivered,
    /// Sink is alive but lost this event (e.g. queue full)
    Dropped,
    /// Sink does not handle this event kind
    Skipped,
}

/// Destination for gateway events. Must not block.
pub trait EventSink: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Hand over one event.
    fn deliver(&self, event: &GatewayEvent) -> Result<Delivery, SinkError>;
}

/// Per-publish counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PublishReport {
    pub delivered: usize,
    pub dropped: usize,
    pub pruned: usize,
}

/// Registry of sinks.
#[derive(Default)]
pub struct EventFanout {
    sinks: RwLock<HashMap<SinkId, Arc<dyn EventSink>>>,
    next_id: AtomicU64,
}

impl EventFanout {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a sink; the returned id unregisters it.
    pub fn register(&self, sink: Arc<dyn EventSink>) -> SinkId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        debug!(sink = sink.name(), id, "sink registered");
        self.write().insert(id, sink);
        id
    }

    /// Remove a sink. Returns false if it was already gone.
    pub fn unregister(&self, id: SinkId) -> bool {
        let removed = self.write().remove(&id);
        if let Some(sink) = &removed {
            debug!(sink = sink.name(), id, "sink unregistered");
        }
        removed.is_some()
    }

    /// Number of registered sinks.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// True when no sink is registered.
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Deliver `event` to every sink, pruning the ones that fail.
    pub fn publish(&self, event: &GatewayEvent) -> PublishReport {
        let targets: Vec<(SinkId, Arc<dyn EventSink>)> = self
            .read()
            .iter()
            .map(|(id, sink)| (*id, Arc::clone(sink)))
            .collect();

        let mut report = PublishReport::default();
        let mut failed = Vec::new();
        for (id, sink) in targets {
            match sink.deliver(event) {
                Ok(Delivery::Delivered) => report.delivered += 1,
                Ok(Delivery::Skipped) => {}
                Ok(Delivery::Dropped) => {
                    report.dropped += 1;
                    debug!(sink = sink.name(), event = event.kind(), "event dropped by sink");
                }
                Err(e) => {
                    warn!(sink = sink.name(), error = %e, "sink failed; removing");
                    failed.push(id);
                }
            }
        }

        if !failed.is_empty() {
            let mut sinks = self.write();
            for id in failed {
                if sinks.remove(&id).is_some() {
                    report.pruned += 1;
                }
            }
        }
        report
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<SinkId, Arc<dyn EventSink>>> {
        self.sinks.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<SinkId, Arc<dyn EventSink>>> {
        self.sinks.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Sink backed by a bounded tokio channel.
///
/// A full queue drops the event for this receiver only; a closed receiver
/// fails delivery so the sink gets pruned.
pub struct ChannelSink {
    name: String,
    tx: mpsc::Sender<GatewayEvent>,
}

impl ChannelSink {
    pub fn new(name: impl Into<String>, tx: mpsc::Sender<GatewayEvent>) -> Self {
        Self {
            name: name.into(),
            tx,
        }
    }

    /// Create a sink and its receiving end.
    pub fn channel(
        name: impl Into<String>,
        capacity: usize,
    ) -> (Self, mpsc::Receiver<GatewayEvent>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self::new(name, tx), rx)
    }
}

impl EventSink for ChannelSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn deliver(&self, event: &GatewayEvent) -> Result<Delivery, SinkError> {
        match self.tx.try_send(event.clone()) {
            Ok(()) => Ok(Delivery::Delivered),
            Err(mpsc::error::TrySendError::Full(_)) => Ok(Delivery::Dropped),
            Err(mpsc::error::TrySendError::Closed(_)) => Err(SinkError::Closed),
        }
    }
}
