//! Vigil gateway service.
//!
//! Wires the snapshot store, presence tracker, fusion evaluator, actuator
//! arbiter and event fan-out into running tasks behind a line transport
//! and a WebSocket live feed.

pub mod backoff;
pub mod context;
pub mod error;
pub mod evaluator;
pub mod gateway;
pub mod heartbeat;
pub mod inbound;
pub mod inputs;
pub mod router;
pub mod shutdown;
pub mod sweeper;
pub mod transport;

pub use backoff::BackoffPolicy;
pub use context::GatewayContext;
pub use error::{GatewayError, InboundError, InputError, TransportError};
pub use evaluator::{tick, TickOutcome};
pub use gateway::{Gateway, GatewayPorts};
pub use inbound::{decode, InboundCommand};
pub use router::route;
pub use transport::{TransportHub, TransportMessage, TransportServer, TransportSink};
