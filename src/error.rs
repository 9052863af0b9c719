//! Error types for the calendar engine.

use thiserror::Error;

/// Errors that can occur in calendar operations.
#[derive(Error, Debug)]
pub enum CalendarError {
    #[error("fetch error: {0}")]
    Fetch(String),

    #[error("unknown source: {0}")]
    UnknownSource(String),

    #[error("source '{0}' is reserved")]
    ReservedSource(String),

    #[error("invalid source configuration: {0}")]
    InvalidSource(String),

    #[error("persistence error: {0}")]
    Persistence(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for calendar operations.
pub type CalendarResult<T> = Result<T, CalendarError>;
