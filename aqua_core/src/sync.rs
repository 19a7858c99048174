//! Keeps the [`StatusStore`] in step with the controller.
//!
//! One pull at start, then a push subscription on a background thread. The
//! thread only moves raw payloads into a bounded queue; the owner of the
//! `SyncChannel` applies them in arrival order through `process_pending` or
//! `next_update`, so the store has exactly one writer.
//!
//! - A push payload that does not parse is dropped; store and health stay.
//! - Losing the stream marks health unhealthy until the next applied payload.
//! - The thread reconnects every `reconnect` and, if configured, pulls once
//!   per attempt while the stream is down.
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use aqua_traits::{Clock, Transport};
use crossbeam_channel as xch;

use crate::config::SyncCfg;
use crate::model::DeviceStatus;
use crate::store::{Snapshot, StatusStore};
use crate::transport_error::map_transport_error;

/// Shutdown is checked at least this often while waiting to reconnect.
const SHUTDOWN_POLL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Health {
    /// Nothing attempted yet
    #[default]
    Unknown,
    Healthy,
    Unhealthy,
}

/// Top-level presentation mode, derived from the latest snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UiMode {
    #[default]
    Dashboard,
    /// The controller has no station connection and serves its own AP
    NetworkSetup,
}

impl UiMode {
    /// Mode after applying `status`. A payload without the station flag
    /// leaves the mode as it was.
    pub const fn next(self, status: &DeviceStatus) -> Self {
        match status.wifi_connected {
            Some(false) => Self::NetworkSetup,
            Some(true) => Self::Dashboard,
            None => self,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Pull,
    Push,
    FallbackPull,
}

/// What the subscription thread hands to the actor.
#[derive(Debug)]
enum Inbound {
    Payload { source: Source, body: String },
    Lost { reason: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum SyncUpdate {
    Applied { source: Source, snapshot: Snapshot },
    Dropped { source: Source, reason: String },
    Lost { reason: String },
}

struct Subscription {
    shutdown: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        // The thread may sit in a blocking read until the stream idles out;
        // join only if it has already finished, otherwise let it wind down.
        let Some(handle) = self.handle.take() else {
            return;
        };
        if !handle.is_finished() {
            tracing::trace!("subscription thread detached");
            return;
        }
        if handle.join().is_err() {
            tracing::warn!("subscription thread panicked");
        }
    }
}

pub struct SyncChannel<T, C> {
    transport: Arc<T>,
    clock: C,
    store: StatusStore,
    cfg: SyncCfg,
    health: Health,
    mode: UiMode,
    rx: Option<xch::Receiver<Inbound>>,
    subscription: Option<Subscription>,
}

impl<T, C> SyncChannel<T, C>
where
    T: Transport + Send + Sync + 'static,
    C: Clock + Clone + Send + 'static,
{
    pub fn new(transport: Arc<T>, store: StatusStore, cfg: SyncCfg, clock: C) -> Self {
        Self {
            transport,
            clock,
            store,
            cfg,
            health: Health::Unknown,
            mode: UiMode::Dashboard,
            rx: None,
            subscription: None,
        }
    }

    pub const fn health(&self) -> Health {
        self.health
    }

    pub const fn ui_mode(&self) -> UiMode {
        self.mode
    }

    pub const fn store(&self) -> &StatusStore {
        &self.store
    }

    pub const fn is_open(&self) -> bool {
        self.subscription.is_some()
    }

    /// Initial pull, then open the push subscription. Returns the result of
    /// the pull; the subscription starts either way.
    pub fn start(&mut self) -> SyncUpdate {
        let first = self.pull();
        if self.subscription.is_none() {
            self.spawn_subscription();
        }
        first
    }

    /// One-shot status pull. Any failure, including an unreadable body,
    /// marks the connection unhealthy.
    pub fn pull(&mut self) -> SyncUpdate {
        let result = match self.transport.get(&self.cfg.status_path) {
            Ok(resp) if resp.is_success() => {
                DeviceStatus::from_json(&resp.body).map_err(|e| e.to_string())
            }
            Ok(resp) => Err(format!("status pull returned HTTP {}", resp.status)),
            Err(e) => Err(map_transport_error(e.as_ref()).to_string()),
        };
        match result {
            Ok(status) => self.apply(Source::Pull, status),
            Err(reason) => {
                tracing::warn!(%reason, "status pull failed");
                self.health = Health::Unhealthy;
                SyncUpdate::Lost { reason }
            }
        }
    }

    /// Apply everything already queued, oldest first.
    pub fn process_pending(&mut self) -> Vec<SyncUpdate> {
        let Some(rx) = self.rx.clone() else {
            return Vec::new();
        };
        rx.try_iter().map(|msg| self.handle(msg)).collect()
    }

    /// Wait up to `timeout` for the next queued item and apply it.
    pub fn next_update(&mut self, timeout: Duration) -> Option<SyncUpdate> {
        let msg = self.rx.as_ref()?.recv_timeout(timeout).ok()?;
        Some(self.handle(msg))
    }

    /// Stop the subscription. Queued payloads are discarded and the store
    /// keeps its last snapshot.
    pub fn close(&mut self) {
        if self.subscription.take().is_some() {
            tracing::debug!("sync channel closed");
        }
        self.rx = None;
    }

    fn handle(&mut self, msg: Inbound) -> SyncUpdate {
        match msg {
            Inbound::Payload { source, body } => match DeviceStatus::from_json(&body) {
                Ok(status) => self.apply(source, status),
                Err(e) => {
                    tracing::warn!(?source, error = %e, "dropping unreadable status payload");
                    SyncUpdate::Dropped {
                        source,
                        reason: e.to_string(),
                    }
                }
            },
            Inbound::Lost { reason } => {
                if self.health != Health::Unhealthy {
                    tracing::warn!(%reason, "push stream lost");
                }
                self.health = Health::Unhealthy;
                SyncUpdate::Lost { reason }
            }
        }
    }

    fn apply(&mut self, source: Source, status: DeviceStatus) -> SyncUpdate {
        let mode = self.mode.next(&status);
        if mode != self.mode {
            tracing::info!(?mode, "presentation mode changed");
            self.mode = mode;
        }
        if self.health != Health::Healthy {
            tracing::info!(?source, "device connection healthy");
            self.health = Health::Healthy;
        }
        let snapshot = self.store.replace(status);
        tracing::trace!(?source, revision = self.store.revision(), "status applied");
        SyncUpdate::Applied { source, snapshot }
    }

    fn spawn_subscription(&mut self) {
        let (tx, rx) = xch::bounded(self.cfg.queue_depth.max(1));
        let shutdown = Arc::new(AtomicBool::new(false));
        let worker = Worker {
            transport: Arc::clone(&self.transport),
            clock: self.clock.clone(),
            cfg: self.cfg.clone(),
            tx,
            shutdown: Arc::clone(&shutdown),
        };
        let handle = std::thread::Builder::new()
            .name("aqua-sync".into())
            .spawn(move || worker.run());
        match handle {
            Ok(handle) => {
                self.rx = Some(rx);
                self.subscription = Some(Subscription {
                    shutdown,
                    handle: Some(handle),
                });
            }
            Err(e) => {
                tracing::error!(error = %e, "could not start subscription thread");
                self.health = Health::Unhealthy;
            }
        }
    }
}

impl<T, C> Drop for SyncChannel<T, C> {
    fn drop(&mut self) {
        self.subscription.take();
    }
}

struct Worker<T, C> {
    transport: Arc<T>,
    clock: C,
    cfg: SyncCfg,
    tx: xch::Sender<Inbound>,
    shutdown: Arc<AtomicBool>,
}

impl<T: Transport, C: Clock> Worker<T, C> {
    fn stopped(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }

    /// False once the actor is gone.
    fn forward(&self, msg: Inbound) -> bool {
        if self.stopped() {
            return false;
        }
        self.tx.send(msg).is_ok()
    }

    fn run(self) {
        while !self.stopped() {
            let reason = match self.transport.subscribe(&self.cfg.events_path) {
                Ok(mut stream) => loop {
                    if self.stopped() {
                        tracing::trace!("subscription thread exiting");
                        return;
                    }
                    match stream.next_event() {
                        Ok(Some(ev)) if ev.event == self.cfg.event_name => {
                            let msg = Inbound::Payload {
                                source: Source::Push,
                                body: ev.data,
                            };
                            if !self.forward(msg) {
                                return;
                            }
                        }
                        Ok(Some(ev)) => tracing::trace!(event = %ev.event, "ignoring event"),
                        Ok(None) => break "push stream closed".to_string(),
                        Err(e) => break map_transport_error(e.as_ref()).to_string(),
                    }
                },
                Err(e) => map_transport_error(e.as_ref()).to_string(),
            };
            if !self.forward(Inbound::Lost { reason }) {
                return;
            }
            if self.cfg.fallback_poll && !self.fallback_pull() {
                return;
            }
            self.wait_reconnect();
        }
        tracing::trace!("subscription thread exiting");
    }

    fn fallback_pull(&self) -> bool {
        match self.transport.get(&self.cfg.status_path) {
            Ok(resp) if resp.is_success() => self.forward(Inbound::Payload {
                source: Source::FallbackPull,
                body: resp.body,
            }),
            Ok(resp) => {
                tracing::debug!(status = resp.status, "fallback pull refused");
                true
            }
            Err(e) => {
                tracing::debug!(error = %e, "fallback pull failed");
                true
            }
        }
    }

    fn wait_reconnect(&self) {
        let mut left = self.cfg.reconnect;
        while !left.is_zero() && !self.stopped() {
            let step = left.min(SHUTDOWN_POLL);
            self.clock.sleep(step);
            left = left.saturating_sub(step);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_follows_station_flag_only_when_present() {
        let mut s = DeviceStatus::default();
        assert_eq!(UiMode::NetworkSetup.next(&s), UiMode::NetworkSetup);
        s.wifi_connected = Some(true);
        assert_eq!(UiMode::NetworkSetup.next(&s), UiMode::Dashboard);
        s.wifi_connected = Some(false);
        assert_eq!(UiMode::Dashboard.next(&s), UiMode::NetworkSetup);
    }
}
