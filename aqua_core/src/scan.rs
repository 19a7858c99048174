//! Network scan polling.
//!
//! The device scans asynchronously: `202` means still scanning, `200`
//! carries the result. The poller retries on `202` every `retry` until a
//! result, an error or `max_attempts`.
use aqua_traits::{Clock, Transport};
use serde::{Deserialize, Serialize};

use crate::config::ScanCfg;
use crate::events::{ErrorBus, ErrorEvent};
use crate::transport_error::map_transport_error;

const SCAN_IN_PROGRESS: u16 = 202;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Network {
    pub ssid: String,
    /// dBm; firmware versions differ on the key name
    #[serde(rename = "signalStrength", alias = "rssi", default)]
    pub signal_strength: i32,
}

#[derive(Debug, Deserialize)]
struct ScanReply {
    #[serde(default)]
    networks: Vec<Network>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ScanState {
    #[default]
    Idle,
    Polling {
        attempts: u32,
    },
    /// Strongest signal first
    Ready(Vec<Network>),
    Failed(String),
}

impl ScanState {
    pub const fn is_done(&self) -> bool {
        matches!(self, Self::Ready(_) | Self::Failed(_))
    }
}

pub struct ScanPoller {
    cfg: ScanCfg,
    state: ScanState,
    errors: Option<ErrorBus>,
}

impl ScanPoller {
    pub fn new(cfg: ScanCfg) -> Self {
        Self {
            cfg,
            state: ScanState::Idle,
            errors: None,
        }
    }

    #[must_use]
    pub fn with_error_bus(mut self, bus: ErrorBus) -> Self {
        self.errors = Some(bus);
        self
    }

    pub const fn state(&self) -> &ScanState {
        &self.state
    }

    pub const fn retry_interval(&self) -> std::time::Duration {
        self.cfg.retry
    }

    /// Begin (or restart) a scan.
    pub fn start(&mut self) {
        self.state = ScanState::Polling { attempts: 0 };
    }

    /// One request. Does nothing unless polling.
    pub fn poll_once<T: Transport + ?Sized>(&mut self, transport: &T) -> &ScanState {
        let ScanState::Polling { attempts } = self.state else {
            return &self.state;
        };
        let attempts = attempts.saturating_add(1);
        let next = match transport.get(&self.cfg.path) {
            Ok(resp) if resp.status == SCAN_IN_PROGRESS => {
                if attempts >= self.cfg.max_attempts {
                    ScanState::Failed(format!("scan did not finish after {attempts} attempts"))
                } else {
                    tracing::debug!(attempts, "scan in progress");
                    ScanState::Polling { attempts }
                }
            }
            Ok(resp) if resp.status == 200 => match serde_json::from_str::<ScanReply>(&resp.body) {
                Ok(reply) => {
                    let mut nets = reply.networks;
                    nets.sort_by(|a, b| b.signal_strength.cmp(&a.signal_strength));
                    tracing::info!(found = nets.len(), "scan complete");
                    ScanState::Ready(nets)
                }
                Err(e) => ScanState::Failed(format!("unreadable scan result: {e}")),
            },
            Ok(resp) => ScanState::Failed(format!("scan failed with HTTP {}", resp.status)),
            Err(e) => ScanState::Failed(map_transport_error(e.as_ref()).to_string()),
        };
        if let (ScanState::Failed(msg), Some(bus)) = (&next, &self.errors) {
            bus.publish(ErrorEvent::new("wifi/scan", msg.clone()));
        }
        self.state = next;
        &self.state
    }

    /// Start and poll until done, waiting `retry` between attempts.
    pub fn run<T: Transport + ?Sized, C: Clock>(&mut self, transport: &T, clock: &C) -> &ScanState {
        self.start();
        loop {
            if self.poll_once(transport).is_done() {
                break;
            }
            clock.sleep(self.cfg.retry);
        }
        &self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aqua_traits::{BoxError, EventStream, Response};
    use std::sync::Mutex;

    struct Replies(Mutex<Vec<Response>>);

    impl Transport for Replies {
        fn get(&self, _path: &str) -> Result<Response, BoxError> {
            let mut q = self.0.lock().unwrap();
            Ok(if q.is_empty() {
                Response::new(202, "")
            } else {
                q.remove(0)
            })
        }
        fn post_json(&self, _: &str, _: Option<&str>) -> Result<Response, BoxError> {
            unreachable!()
        }
        fn post_form(&self, _: &str, _: &[(&str, &str)]) -> Result<Response, BoxError> {
            unreachable!()
        }
        fn subscribe(&self, _: &str) -> Result<Box<dyn EventStream + Send>, BoxError> {
            unreachable!()
        }
    }

    #[test]
    fn idle_poller_does_not_request() {
        let t = Replies(Mutex::new(vec![Response::new(500, "")]));
        let mut p = ScanPoller::new(ScanCfg::default());
        assert_eq!(p.poll_once(&t), &ScanState::Idle);
        assert_eq!(t.0.lock().unwrap().len(), 1);
    }

    #[test]
    fn accepts_both_signal_keys_and_sorts() {
        let body = r#"{"networks":[{"ssid":"a","rssi":-80},{"ssid":"b","signalStrength":-40}]}"#;
        let t = Replies(Mutex::new(vec![Response::new(202, ""), Response::new(200, body)]));
        let mut p = ScanPoller::new(ScanCfg::default());
        p.start();
        assert_eq!(p.poll_once(&t), &ScanState::Polling { attempts: 1 });
        match p.poll_once(&t) {
            ScanState::Ready(nets) => {
                assert_eq!(nets[0].ssid, "b");
                assert_eq!(nets[1].signal_strength, -80);
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
