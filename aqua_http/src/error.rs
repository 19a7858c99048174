use thiserror::Error;

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("connect to {url}: {reason}")]
    Connect { url: String, reason: String },
    #[error("request timed out")]
    Timeout,
    #[error("push stream timed out waiting for data")]
    StreamIdle,
    #[error("transport: {0}")]
    Transport(String),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, HttpError>;
