//! Broadcast to any number of bounded receivers.
//!
//! A slow consumer never blocks the producer. When a subscriber's queue is
//! full its oldest entry is discarded, so the newest value always lands.
//! Subscribers are dropped once their `Feed` goes away.
use crossbeam_channel as xch;
use std::ops::Deref;
use std::sync::{Arc, Mutex, PoisonError, Weak};

/// Receiving end of a fan-out subscription. Derefs to the channel receiver.
#[derive(Debug)]
pub struct Feed<T> {
    rx: xch::Receiver<T>,
    _alive: Arc<()>,
}

impl<T> Deref for Feed<T> {
    type Target = xch::Receiver<T>;

    fn deref(&self) -> &Self::Target {
        &self.rx
    }
}

struct Slot<T> {
    tx: xch::Sender<T>,
    /// Producer-side handle used to evict the oldest entry.
    evict: xch::Receiver<T>,
    alive: Weak<()>,
}

pub struct Fanout<T> {
    depth: usize,
    slots: Mutex<Vec<Slot<T>>>,
}

impl<T: Clone> Fanout<T> {
    pub fn new(depth: usize) -> Self {
        Self {
            depth: depth.max(1),
            slots: Mutex::new(Vec::new()),
        }
    }

    pub fn subscribe(&self) -> Feed<T> {
        let (tx, rx) = xch::bounded(self.depth);
        let alive = Arc::new(());
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Slot {
                tx,
                evict: rx.clone(),
                alive: Arc::downgrade(&alive),
            });
        Feed { rx, _alive: alive }
    }

    pub fn send(&self, value: &T) {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots.retain(|slot| {
            if slot.alive.strong_count() == 0 {
                return false;
            }
            let mut pending = value.clone();
            loop {
                match slot.tx.try_send(pending) {
                    Ok(()) => return true,
                    Err(xch::TrySendError::Full(v)) => {
                        tracing::trace!("subscriber queue full; evicting oldest");
                        let _ = slot.evict.try_recv();
                        pending = v;
                    }
                    Err(xch::TrySendError::Disconnected(_)) => return false,
                }
            }
        });
    }

    pub fn subscriber_count(&self) -> usize {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|s| s.alive.strong_count() > 0)
            .count()
    }
}
