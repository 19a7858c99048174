//! Seams between the supervisory core and the device it mirrors.
//!
//! The core never talks HTTP directly; everything goes through `Transport`
//! (request/response) and `EventStream` (the push subscription). Errors cross
//! these boundaries boxed so any backend can plug in.
pub mod clock;

pub use clock::{Clock, SystemClock};

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Raw response from the device: HTTP status plus the undecoded body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub body: String,
}

impl Response {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    #[inline]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// One dispatched server-sent event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerEvent {
    /// Event name; `message` when the server did not name it.
    pub event: String,
    pub data: String,
    pub id: Option<String>,
}

/// A live push subscription.
pub trait EventStream {
    /// Block until the next event. `Ok(None)` means the server closed the stream.
    fn next_event(&mut self) -> Result<Option<ServerEvent>, BoxError>;
}

pub trait Transport {
    fn get(&self, path: &str) -> Result<Response, BoxError>;

    /// POST with an optional JSON body.
    fn post_json(&self, path: &str, body: Option<&str>) -> Result<Response, BoxError>;

    /// POST an `application/x-www-form-urlencoded` body.
    fn post_form(&self, path: &str, fields: &[(&str, &str)]) -> Result<Response, BoxError>;

    /// Open a push subscription on `path`.
    fn subscribe(&self, path: &str) -> Result<Box<dyn EventStream + Send>, BoxError>;
}

impl<T: Transport + ?Sized> Transport for std::sync::Arc<T> {
    fn get(&self, path: &str) -> Result<Response, BoxError> {
        (**self).get(path)
    }
    fn post_json(&self, path: &str, body: Option<&str>) -> Result<Response, BoxError> {
        (**self).post_json(path, body)
    }
    fn post_form(&self, path: &str, fields: &[(&str, &str)]) -> Result<Response, BoxError> {
        (**self).post_form(path, fields)
    }
    fn subscribe(&self, path: &str) -> Result<Box<dyn EventStream + Send>, BoxError> {
        (**self).subscribe(path)
    }
}
