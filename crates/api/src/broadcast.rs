//! Live fan-out of batch summaries to dashboard viewers.
//!
//! At-most-once and best effort: a viewer whose buffer is full misses that
//! update. Publishing never waits on a subscriber.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use beacon_core::BatchSummary;
use parking_lot::RwLock;
use telemetry::metrics;
use tokio::sync::mpsc;
use tracing::debug;

/// Opaque subscriber handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

/// Registry of live subscribers.
pub struct Broadcaster {
    subscribers: RwLock<HashMap<SubscriberId, mpsc::Sender<BatchSummary>>>,
    next_id: AtomicU64,
    buffer: usize,
}

impl Broadcaster {
    /// `buffer` is the per-subscriber channel capacity.
    pub fn new(buffer: usize) -> Self {
        Self {
            subscribers: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            buffer: buffer.max(1),
        }
    }

    /// Register a new subscriber.
    pub fn subscribe(&self) -> (SubscriberId, mpsc::Receiver<BatchSummary>) {
        let (tx, rx) = mpsc::channel(self.buffer);
        let id = SubscriberId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.subscribers.write().insert(id, tx);
        metrics().active_subscribers.inc();
        debug!(subscriber = id.0, "Stream subscriber registered");
        (id, rx)
    }

    /// Remove a subscriber. Unknown handles are ignored.
    pub fn unsubscribe(&self, id: SubscriberId) {
        if self.subscribers.write().remove(&id).is_some() {
            metrics().active_subscribers.dec();
            debug!(subscriber = id.0, "Stream subscriber removed");
        }
    }

    /// Offer `summary` to every subscriber. Returns how many accepted it.
    pub fn publish(&self, summary: &BatchSummary) -> usize {
        let subscribers = self.subscribers.read();
        if subscribers.is_empty() {
            return 0;
        }

        let mut delivered = 0;
        for tx in subscribers.values() {
            match tx.try_send(summary.clone()) {
                Ok(()) => delivered += 1,
                // Full buffer or a receiver that is already gone.
                Err(_) => metrics().broadcast_dropped.inc(),
            }
        }
        metrics().broadcasts.inc();
        delivered
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }
}

/// A subscription that unregisters itself when dropped.
pub struct Subscription {
    id: SubscriberId,
    rx: mpsc::Receiver<BatchSummary>,
    broadcaster: Arc<Broadcaster>,
}

impl Subscription {
    pub fn new(broadcaster: Arc<Broadcaster>) -> Self {
        let (id, rx) = broadcaster.subscribe();
        Self { id, rx, broadcaster }
    }

    pub fn id(&self) -> SubscriberId {
        self.id
    }

    pub async fn recv(&mut self) -> Option<BatchSummary> {
        self.rx.recv().await
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.broadcaster.unsubscribe(self.id);
    }
}
