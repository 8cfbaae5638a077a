//! Gateway service errors.

use std::io;
use thiserror::Error;

use vigil_core::CoreError;
use vigil_fanout::{LiveFeedError, PersistenceError};

/// Inbound message could not be turned into a command.
#[derive(Debug, Error)]
pub enum InboundError {
    #[error("malformed JSON on {topic}: {source}")]
    Json {
        topic: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid flag on {topic}: {source}")]
    Flag {
        topic: String,
        #[source]
        source: CoreError,
    },

    #[error("no route for topic {0}")]
    UnknownTopic(String),
}

/// Line transport failures.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("malformed line: {0:?}")]
    MalformedLine(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Local input read failures.
#[derive(Debug, Error)]
pub enum InputError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("invalid input value: {0}")]
    InvalidValue(#[from] CoreError),
}

/// Startup failures.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("live feed error: {0}")]
    LiveFeed(#[from] LiveFeedError),

    #[error("persistence error: {0}")]
    Persistence(#[from] PersistenceError),
}
