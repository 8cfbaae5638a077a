//! Error types for event delivery and persistence.

use thiserror::Error;

/// Delivery failure; the fan-out prunes a sink that returns one.
#[derive(Debug, Error)]
pub enum SinkError {
    /// Receiving side is gone
    #[error("Sink closed")]
    Closed,

    /// Event could not be encoded for this sink
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Any other sink-specific failure
    #[error("Sink failed: {0}")]
    Failed(String),
}

/// Sample store errors.
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// Database errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Writer thread could not be started
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Live feed server errors.
#[derive(Debug, Error)]
pub enum LiveFeedError {
    /// Network I/O errors
    #[error("Network I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// WebSocket protocol errors
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for persistence operations.
pub type PersistenceResult<T> = Result<T, PersistenceError>;
