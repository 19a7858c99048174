use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum AquaError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("timeout waiting for device")]
    Timeout,
    /// The device answered with an explicit `error` field.
    #[error("device rejected request: {0}")]
    Device(String),
    #[error("unreadable payload: {0}")]
    Parse(String),
    #[error("invalid input: {0}")]
    Validation(#[from] ValidationError),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("session closed")]
    Closed,
}

/// Operator input rejected before any request is sent.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    #[error("{field} must be > 0 (got {value})")]
    NotPositive { field: &'static str, value: f64 },
    #[error("{field} must be >= 0 (got {value})")]
    Negative { field: &'static str, value: f64 },
    #[error("{field} must be in {min}..={max} (got {value})")]
    OutOfRange {
        field: &'static str,
        value: i64,
        min: i64,
        max: i64,
    },
    #[error("{field} must be a finite number")]
    NotFinite { field: &'static str },
    #[error("{field} must not be empty")]
    Empty { field: &'static str },
    /// 0-based index; shown 1-based
    #[error("channel {} is reserved for prime and has no weekly schedule", .channel + 1)]
    ReservedChannel { channel: usize },
}

#[derive(Debug, Error, Clone)]
pub enum BuildError {
    #[error("missing transport")]
    MissingTransport,
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
