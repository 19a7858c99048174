//! The single authoritative status snapshot.
//!
//! Readers get an `Arc` to an immutable snapshot; a new payload replaces the
//! whole thing, never merges into it. Only the sync channel writes.
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use crate::config::DisplayCfg;
use crate::fanout::{Fanout, Feed};
use crate::metrics::DerivedMetrics;
use crate::model::DeviceStatus;

pub type Snapshot = Arc<DeviceStatus>;

const WATCH_QUEUE_DEPTH: usize = 8;

struct Inner {
    current: RwLock<Option<Snapshot>>,
    revision: AtomicU64,
    watchers: Fanout<Snapshot>,
}

#[derive(Clone)]
pub struct StatusStore {
    inner: Arc<Inner>,
}

impl Default for StatusStore {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                current: RwLock::new(None),
                revision: AtomicU64::new(0),
                watchers: Fanout::new(WATCH_QUEUE_DEPTH),
            }),
        }
    }

    /// Latest snapshot, or `None` before the first successful sync.
    pub fn snapshot(&self) -> Option<Snapshot> {
        self.inner
            .current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of replacements so far; 0 while empty.
    pub fn revision(&self) -> u64 {
        self.inner.revision.load(Ordering::Acquire)
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot().is_none()
    }

    /// Receive future snapshots. A reader that falls behind misses
    /// intermediate snapshots, never the store's current one.
    pub fn subscribe(&self) -> Feed<Snapshot> {
        self.inner.watchers.subscribe()
    }

    pub fn metrics(&self, now: i64, cfg: &DisplayCfg) -> Option<DerivedMetrics> {
        self.snapshot()
            .map(|s| DerivedMetrics::from_snapshot(&s, now, cfg))
    }

    pub(crate) fn replace(&self, status: DeviceStatus) -> Snapshot {
        let snap = Arc::new(status);
        {
            let mut cur = self
                .inner
                .current
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            *cur = Some(Arc::clone(&snap));
            self.inner.revision.fetch_add(1, Ordering::AcqRel);
        }
        self.inner.watchers.send(&snap);
        snap
    }
}
