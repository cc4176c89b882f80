//! Error types for calgrid.
//!
//! Only explicit parse and load entry points return these. Event data that
//! fails to refine is dropped rather than reported.

use thiserror::Error;

/// Errors that can occur in calgrid operations.
#[derive(Error, Debug)]
pub enum CalGridError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid duration: {0}")]
    InvalidDuration(String),

    #[error("Invalid date: {0}")]
    InvalidDate(String),

    #[error("Unknown time zone '{0}'")]
    InvalidTimeZone(String),

    #[error("Invalid event order field spec: {0}")]
    InvalidOrder(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type alias for calgrid operations.
pub type CalGridResult<T> = Result<T, CalGridError>;
