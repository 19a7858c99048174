//! One operator session against one controller.
//!
//! Bundles the store, the sync channel, the command dispatcher and the error
//! bus. Closing (or dropping) the session stops the subscription and makes
//! late command results go nowhere.
use std::sync::Arc;

use aqua_traits::{Clock, SystemClock, Transport};

use crate::config::{DisplayCfg, ScanCfg, SyncCfg};
use crate::dispatcher::CommandDispatcher;
use crate::error::{BuildError, Result};
use crate::events::{ErrorBus, ErrorEvent};
use crate::fanout::Feed;
use crate::metrics::DerivedMetrics;
use crate::scan::ScanPoller;
use crate::store::StatusStore;
use crate::sync::{Health, SyncChannel, SyncUpdate, UiMode};

pub struct SessionBuilder<T, C = SystemClock> {
    transport: Option<Arc<T>>,
    clock: C,
    sync: SyncCfg,
    scan: ScanCfg,
    display: DisplayCfg,
}

impl<T> Default for SessionBuilder<T, SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> SessionBuilder<T, SystemClock> {
    pub fn new() -> Self {
        Self {
            transport: None,
            clock: SystemClock,
            sync: SyncCfg::default(),
            scan: ScanCfg::default(),
            display: DisplayCfg::default(),
        }
    }
}

impl<T, C> SessionBuilder<T, C>
where
    T: Transport + Send + Sync + 'static,
    C: Clock + Clone + Send + 'static,
{
    #[must_use]
    pub fn transport(mut self, t: Arc<T>) -> Self {
        self.transport = Some(t);
        self
    }

    pub fn clock<C2>(self, clock: C2) -> SessionBuilder<T, C2> {
        SessionBuilder {
            transport: self.transport,
            clock,
            sync: self.sync,
            scan: self.scan,
            display: self.display,
        }
    }

    #[must_use]
    pub fn sync(mut self, cfg: SyncCfg) -> Self {
        self.sync = cfg;
        self
    }

    #[must_use]
    pub fn scan(mut self, cfg: ScanCfg) -> Self {
        self.scan = cfg;
        self
    }

    #[must_use]
    pub fn display(mut self, cfg: DisplayCfg) -> Self {
        self.display = cfg;
        self
    }

    pub fn build(self) -> Result<Session<T, C>> {
        let transport = self
            .transport
            .ok_or_else(|| eyre::Report::new(BuildError::MissingTransport))?;
        if self.sync.queue_depth == 0 {
            return Err(eyre::Report::new(BuildError::InvalidConfig(
                "queue depth must be >= 1",
            )));
        }
        if !self.sync.events_path.starts_with('/') || !self.sync.status_path.starts_with('/') {
            return Err(eyre::Report::new(BuildError::InvalidConfig(
                "paths must start with '/'",
            )));
        }
        let store = StatusStore::new();
        let errors = ErrorBus::new();
        Ok(Session {
            sync: SyncChannel::new(
                Arc::clone(&transport),
                store.clone(),
                self.sync,
                self.clock.clone(),
            ),
            dispatcher: CommandDispatcher::new(Arc::clone(&transport), errors.clone()),
            transport,
            clock: self.clock,
            store,
            errors,
            scan: self.scan,
            display: self.display,
        })
    }
}

pub struct Session<T, C = SystemClock> {
    transport: Arc<T>,
    clock: C,
    store: StatusStore,
    sync: SyncChannel<T, C>,
    dispatcher: CommandDispatcher<T>,
    errors: ErrorBus,
    scan: ScanCfg,
    display: DisplayCfg,
}

impl<T, C> Session<T, C>
where
    T: Transport + Send + Sync + 'static,
    C: Clock + Clone + Send + 'static,
{
    /// Initial pull and push subscription.
    pub fn start(&mut self) -> SyncUpdate {
        self.sync.start()
    }

    pub fn close(&mut self) {
        self.dispatcher.close();
        self.sync.close();
    }

    pub const fn store(&self) -> &StatusStore {
        &self.store
    }

    pub fn sync_mut(&mut self) -> &mut SyncChannel<T, C> {
        &mut self.sync
    }

    pub const fn dispatcher(&self) -> &CommandDispatcher<T> {
        &self.dispatcher
    }

    pub const fn transport(&self) -> &Arc<T> {
        &self.transport
    }

    pub const fn clock(&self) -> &C {
        &self.clock
    }

    pub fn errors(&self) -> Feed<ErrorEvent> {
        self.errors.subscribe()
    }

    pub const fn health(&self) -> Health {
        self.sync.health()
    }

    pub const fn ui_mode(&self) -> UiMode {
        self.sync.ui_mode()
    }

    pub const fn display(&self) -> &DisplayCfg {
        &self.display
    }

    /// Derived values for the current snapshot at the clock's wall time.
    pub fn metrics(&self) -> Option<DerivedMetrics> {
        self.store.metrics(self.clock.unix_secs(), &self.display)
    }

    pub fn scanner(&self) -> ScanPoller {
        ScanPoller::new(self.scan.clone()).with_error_bus(self.errors.clone())
    }
}

impl<T, C> Drop for Session<T, C> {
    fn drop(&mut self) {
        self.dispatcher.close();
    }
}
