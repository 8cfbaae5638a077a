//! Core error types

use thiserror::Error;

/// Core error type for Vigil
#[derive(Debug, Error)]
pub enum CoreError {
    /// A boolean-as-string value was not one of the accepted spellings
    #[error("Invalid boolean flag: {0:?}")]
    InvalidFlag(String),

    /// A safety status label was not recognised
    #[error("Unknown safety status: {0:?}")]
    UnknownStatus(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;
