//! Event fan-out for the Vigil gateway.
//!
//! Status and presence changes are published once to an [`EventFanout`]
//! and delivered best-effort to every registered sink: live WebSocket
//! subscribers, the SQLite sample store and the transport republisher.

pub mod error;
pub mod event;
pub mod live;
pub mod persist;
pub mod sink;

pub use error::{LiveFeedError, PersistenceError, PersistenceResult, SinkError};
pub use event::{wall_clock_now, DeviceStatusReport, GatewayEvent, SensorReport, TIMESTAMP_FORMAT};
pub use live::{Greeting, LiveFeedServer};
pub use persist::{PersistenceSink, SampleRecord, SampleStore};
pub use sink::{ChannelSink, Delivery, EventFanout, EventSink, PublishReport, SinkId};
