#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Transports to the aquarium controller.
//!
//! - `HttpTransport`: blocking HTTP (ureq) for pulls and commands, plus a
//!   long-lived `text/event-stream` connection for pushes.
//! - `SimulatedDevice`: an in-memory controller that answers the same API,
//!   for demos and tests without hardware on the network.
pub mod error;
pub mod sim;
pub mod sse;

use std::io::BufReader;
use std::time::Duration;

use aqua_traits::{BoxError, EventStream, Response, Transport};

pub use error::HttpError;
pub use sim::SimulatedDevice;
pub use sse::SseReader;

#[derive(Debug, Clone, Copy)]
pub struct HttpOptions {
    pub connect_timeout: Duration,
    /// Overall deadline for pulls and commands
    pub request_timeout: Duration,
    /// Read timeout on the push stream; silence past this ends the stream
    pub stream_idle_timeout: Duration,
}

impl Default for HttpOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(3),
            request_timeout: Duration::from_secs(5),
            stream_idle_timeout: Duration::from_secs(10),
        }
    }
}

pub struct HttpTransport {
    base_url: String,
    agent: ureq::Agent,
    /// No overall deadline: the stream stays open for the whole session.
    stream_agent: ureq::Agent,
}

impl HttpTransport {
    pub fn new(base_url: &str, opts: HttpOptions) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(opts.connect_timeout)
            .timeout(opts.request_timeout)
            .build();
        let stream_agent = ureq::AgentBuilder::new()
            .timeout_connect(opts.connect_timeout)
            .timeout_read(opts.stream_idle_timeout)
            .build();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            agent,
            stream_agent,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Non-2xx statuses are still responses: the device signals errors in the
    /// body and the caller decides what a status means.
    fn finish(
        url: &str,
        result: Result<ureq::Response, ureq::Error>,
    ) -> error::Result<Response> {
        match result {
            Ok(resp) => {
                let status = resp.status();
                let body = resp.into_string()?;
                tracing::trace!(url, status, bytes = body.len(), "response");
                Ok(Response { status, body })
            }
            Err(ureq::Error::Status(status, resp)) => {
                let body = resp.into_string().unwrap_or_default();
                tracing::debug!(url, status, "non-success status");
                Ok(Response { status, body })
            }
            Err(ureq::Error::Transport(t)) => Err(map_transport(url, &t)),
        }
    }
}

fn map_transport(url: &str, t: &ureq::Transport) -> HttpError {
    let msg = t.to_string();
    match t.kind() {
        ureq::ErrorKind::Dns | ureq::ErrorKind::ConnectionFailed => HttpError::Connect {
            url: url.to_string(),
            reason: msg,
        },
        _ if msg.to_ascii_lowercase().contains("timed out") => HttpError::Timeout,
        _ => HttpError::Transport(msg),
    }
}

impl Transport for HttpTransport {
    fn get(&self, path: &str) -> Result<Response, BoxError> {
        let url = self.url(path);
        let result = self.agent.get(&url).call();
        Ok(Self::finish(&url, result)?)
    }

    fn post_json(&self, path: &str, body: Option<&str>) -> Result<Response, BoxError> {
        let url = self.url(path);
        let req = self.agent.post(&url);
        let result = match body {
            Some(b) => req.set("Content-Type", "application/json").send_string(b),
            None => req.call(),
        };
        Ok(Self::finish(&url, result)?)
    }

    fn post_form(&self, path: &str, fields: &[(&str, &str)]) -> Result<Response, BoxError> {
        let url = self.url(path);
        let result = self.agent.post(&url).send_form(fields);
        Ok(Self::finish(&url, result)?)
    }

    fn subscribe(&self, path: &str) -> Result<Box<dyn EventStream + Send>, BoxError> {
        let url = self.url(path);
        let resp = match self
            .stream_agent
            .get(&url)
            .set("Accept", "text/event-stream")
            .call()
        {
            Ok(resp) => resp,
            Err(ureq::Error::Status(status, _)) => {
                return Err(Box::new(HttpError::Transport(format!(
                    "push subscription refused with status {status}"
                ))));
            }
            Err(ureq::Error::Transport(t)) => return Err(Box::new(map_transport(&url, &t))),
        };
        tracing::debug!(url, "push subscription open");
        Ok(Box::new(SseReader::new(BufReader::new(resp.into_reader()))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_joins_without_double_slash() {
        let t = HttpTransport::new("http://aq.local/", HttpOptions::default());
        assert_eq!(t.base_url(), "http://aq.local");
        assert_eq!(t.url("/api/status"), "http://aq.local/api/status");
    }

    #[test]
    fn unreachable_host_is_a_transport_error() {
        // Port 9 on localhost is discard/closed on CI hosts.
        let t = HttpTransport::new(
            "http://127.0.0.1:9",
            HttpOptions {
                connect_timeout: Duration::from_millis(200),
                request_timeout: Duration::from_millis(400),
                stream_idle_timeout: Duration::from_millis(400),
            },
        );
        let err = t.get("/api/status").unwrap_err();
        assert!(err.downcast_ref::<HttpError>().is_some());
    }
}
