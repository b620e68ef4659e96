//! Broadcast "something changed" to any number of waiters.
//!
//! A [`Signal`] keeps one wake slot per bound [`Waiter`]. `broadcast()` fills
//! every slot; a waiter empties its slot when it wakes. A slot holds at most
//! one pending wakeup, so N broadcasts between two waits are observed as one.
//! Callers must re-read the source of truth after each wakeup rather than
//! count wakeups.
//!
//! Binding before reading state closes the lost-wakeup window: a broadcast
//! that lands between the read and the wait leaves the slot full, and the
//! wait returns immediately.
//!
//! Each slot is a `tokio::sync::Notify`, whose single stored permit gives the
//! coalescing behaviour. `broadcast()` never waits on a waiter.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tokio::sync::Notify;
use tracing::trace;

/// Broadcast/await primitive shared by writers and watchers
pub struct Signal {
    /// Bumped on every broadcast
    generation: AtomicU64,
    /// Source of waiter ids
    next_id: AtomicU64,
    /// Wake slot per bound waiter
    slots: Mutex<FxHashMap<u64, Arc<Notify>>>,
}

impl Signal {
    /// Create a signal with no waiters
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            generation: AtomicU64::new(0),
            next_id: AtomicU64::new(0),
            slots: Mutex::new(FxHashMap::default()),
        })
    }

    /// Register interest in the next broadcast
    ///
    /// The waiter unbinds itself when dropped.
    pub fn bind(self: &Arc<Self>) -> Waiter {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let slot = Arc::new(Notify::new());
        self.slots.lock().insert(id, Arc::clone(&slot));
        Waiter {
            id,
            slot,
            seen_generation: self.generation(),
            signal: Arc::clone(self),
        }
    }

    /// Remove interest; equivalent to dropping the waiter
    pub fn unbind(&self, waiter: Waiter) {
        drop(waiter);
    }

    /// Wake every currently bound waiter
    pub fn broadcast(&self) {
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        let slots = self.slots.lock();
        for slot in slots.values() {
            slot.notify_one();
        }
        trace!(target: "databroker::signal", generation, waiters = slots.len(), "Broadcast");
    }

    /// Number of broadcasts so far
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Number of bound waiters
    pub fn waiter_count(&self) -> usize {
        self.slots.lock().len()
    }

    fn remove(&self, id: u64) {
        self.slots.lock().remove(&id);
    }
}

impl fmt::Debug for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("generation", &self.generation())
            .field("waiters", &self.waiter_count())
            .finish()
    }
}

/// A bound interest in a [`Signal`]
pub struct Waiter {
    id: u64,
    slot: Arc<Notify>,
    seen_generation: u64,
    signal: Arc<Signal>,
}

impl Waiter {
    /// Wait until at least one broadcast happened since the last wakeup
    ///
    /// Returns immediately if a broadcast is already pending. Cancel-safe:
    /// dropping the future leaves any pending wakeup in place.
    pub async fn wait(&mut self) {
        self.slot.notified().await;
        self.seen_generation = self.signal.generation();
    }

    /// Generation observed at bind time or at the last wakeup
    pub fn seen_generation(&self) -> u64 {
        self.seen_generation
    }
}

impl Drop for Waiter {
    fn drop(&mut self) {
        self.signal.remove(self.id);
    }
}

impl fmt::Debug for Waiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Waiter")
            .field("id", &self.id)
            .field("seen_generation", &self.seen_generation)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    const SHORT: Duration = Duration::from_millis(50);

    #[tokio::test]
    async fn test_broadcast_wakes_bound_waiter() {
        let signal = Signal::new();
        let mut waiter = signal.bind();

        let handle = tokio::spawn(async move {
            waiter.wait().await;
            waiter.seen_generation()
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        signal.broadcast();

        let seen = timeout(Duration::from_secs(1), handle)
            .await
            .expect("waiter should wake")
            .unwrap();
        assert_eq!(seen, 1);
    }

    #[tokio::test]
    async fn test_broadcast_before_wait_is_not_lost() {
        let signal = Signal::new();
        let mut waiter = signal.bind();
        signal.broadcast();

        timeout(SHORT, waiter.wait())
            .await
            .expect("pending wakeup should be observed");
    }

    #[tokio::test]
    async fn test_bursts_coalesce_into_one_wakeup() {
        let signal = Signal::new();
        let mut waiter = signal.bind();
        for _ in 0..10 {
            signal.broadcast();
        }

        timeout(SHORT, waiter.wait()).await.expect("first wakeup");
        assert!(
            timeout(SHORT, waiter.wait()).await.is_err(),
            "ten broadcasts must not produce a second wakeup"
        );
        assert_eq!(waiter.seen_generation(), 10);
    }

    #[tokio::test]
    async fn test_every_waiter_wakes() {
        let signal = Signal::new();
        let mut waiters: Vec<_> = (0..5).map(|_| signal.bind()).collect();
        signal.broadcast();

        for waiter in waiters.iter_mut() {
            timeout(SHORT, waiter.wait()).await.expect("each waiter wakes");
        }
    }

    #[tokio::test]
    async fn test_waiter_bound_after_broadcast_does_not_wake() {
        let signal = Signal::new();
        signal.broadcast();
        let mut waiter = signal.bind();
        assert!(timeout(SHORT, waiter.wait()).await.is_err());
    }

    #[test]
    fn test_unbind_and_drop_remove_waiter() {
        let signal = Signal::new();
        let a = signal.bind();
        let b = signal.bind();
        assert_eq!(signal.waiter_count(), 2);

        signal.unbind(a);
        assert_eq!(signal.waiter_count(), 1);
        drop(b);
        assert_eq!(signal.waiter_count(), 0);

        // Broadcasting with nobody bound is fine
        signal.broadcast();
        assert_eq!(signal.generation(), 1);
    }
}
