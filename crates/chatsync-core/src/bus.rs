//! Fan-out of [`ServerEvent`]s to every live subscriber.
//!
//! Each subscriber owns a bounded queue. A broadcast makes exactly one
//! non-blocking enqueue attempt per subscriber; a subscriber whose queue is
//! full or whose receiving end is gone is removed on the spot. Nothing is
//! retried and the producer never waits.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio::sync::mpsc::{self, error::TrySendError};

use crate::event::ServerEvent;

pub const DEFAULT_SUBSCRIBER_BUFFER: usize = 32;

pub type SubscriberId = u64;

#[derive(Clone)]
pub struct NotificationBus {
    inner: Arc<BusInner>,
}

struct BusInner {
    subscribers: Mutex<HashMap<SubscriberId, mpsc::Sender<ServerEvent>>>,
    next_id: AtomicU64,
    buffer: usize,
}

impl NotificationBus {
    /// `buffer` is the per-subscriber queue depth (at least 1).
    pub fn new(buffer: usize) -> Self {
        Self {
            inner: Arc::new(BusInner {
                subscribers: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(1),
                buffer: buffer.max(1),
            }),
        }
    }

    /// Join the live set. The returned subscription already holds a
    /// `connected` event and leaves the set when dropped.
    pub fn subscribe(&self) -> Subscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(self.inner.buffer);
        // Fresh queue with capacity >= 1: cannot be full.
        let _ = tx.try_send(ServerEvent::connected());

        let count = {
            let mut subscribers = self.inner.subscribers.lock();
            subscribers.insert(id, tx);
            subscribers.len()
        };
        tracing::debug!(subscriber = id, live = count, "subscriber joined");

        Subscription {
            id,
            rx,
            bus: self.clone(),
        }
    }

    /// Leave the live set. Returns whether `id` was still present.
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        let removed = self.inner.subscribers.lock().remove(&id).is_some();
        if removed {
            tracing::debug!(subscriber = id, "subscriber left");
        }
        removed
    }

    /// Deliver `event` to every live subscriber and return how many took it.
    pub fn broadcast(&self, event: ServerEvent) -> usize {
        let mut delivered = 0;
        let mut subscribers = self.inner.subscribers.lock();
        subscribers.retain(|id, tx| match tx.try_send(event.clone()) {
            Ok(()) => {
                delivered += 1;
                true
            }
            Err(TrySendError::Full(_)) => {
                tracing::warn!(subscriber = id, "subscriber queue full, dropping subscriber");
                false
            }
            Err(TrySendError::Closed(_)) => {
                tracing::debug!(subscriber = id, "subscriber gone, pruning");
                false
            }
        });
        tracing::debug!(
            event = event.kind(),
            delivered,
            live = subscribers.len(),
            "broadcast"
        );
        delivered
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.lock().len()
    }
}

impl Default for NotificationBus {
    fn default() -> Self {
        Self::new(DEFAULT_SUBSCRIBER_BUFFER)
    }
}

/// One subscriber's end of the bus.
pub struct Subscription {
    id: SubscriberId,
    rx: mpsc::Receiver<ServerEvent>,
    bus: NotificationBus,
}

impl Subscription {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Next event, or `None` once the bus has dropped this subscriber and
    /// the queue is drained.
    pub async fn recv(&mut self) -> Option<ServerEvent> {
        self.rx.recv().await
    }

    /// Next already-queued event, without waiting.
    pub fn try_recv(&mut self) -> Option<ServerEvent> {
        self.rx.try_recv().ok()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.bus.unsubscribe(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscribe_acknowledges_immediately() {
        let bus = NotificationBus::default();
        let mut sub = bus.subscribe();
        assert_eq!(sub.try_recv(), Some(ServerEvent::connected()));
        assert_eq!(sub.try_recv(), None);
        assert_eq!(bus.subscriber_count(), 1);
    }

    #[test]
    fn broadcast_reaches_every_connected_subscriber_once() {
        let bus = NotificationBus::default();
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();
        a.try_recv();
        b.try_recv();

        let delivered = bus.broadcast(ServerEvent::user_data_updated("eggs"));
        assert_eq!(delivered, 2);
        for sub in [&mut a, &mut b] {
            assert_eq!(sub.try_recv(), Some(ServerEvent::user_data_updated("eggs")));
            assert_eq!(sub.try_recv(), None);
        }
    }

    #[test]
    fn dropped_subscription_leaves_the_set_and_misses_later_events() {
        let bus = NotificationBus::default();
        let mut stays = bus.subscribe();
        let leaves = bus.subscribe();
        let leaving_id = leaves.id();
        drop(leaves);

        assert_eq!(bus.subscriber_count(), 1);
        assert!(!bus.unsubscribe(leaving_id));
        assert_eq!(bus.broadcast(ServerEvent::user_data_updated("x")), 1);

        stays.try_recv();
        assert_eq!(stays.try_recv(), Some(ServerEvent::user_data_updated("x")));
    }

    #[test]
    fn full_subscriber_is_pruned_without_blocking_others() {
        let bus = NotificationBus::new(1);
        // The connected event already fills this queue.
        let mut slow = bus.subscribe();
        let mut fast = bus.subscribe();
        assert_eq!(fast.try_recv(), Some(ServerEvent::connected()));

        let delivered = bus.broadcast(ServerEvent::user_data_updated("v1"));
        assert_eq!(delivered, 1);
        assert_eq!(bus.subscriber_count(), 1);
        assert_eq!(fast.try_recv(), Some(ServerEvent::user_data_updated("v1")));

        // The pruned subscriber drains what it had, then sees the end.
        assert_eq!(slow.try_recv(), Some(ServerEvent::connected()));
        assert_eq!(slow.try_recv(), None);
    }

    #[tokio::test]
    async fn pruned_subscription_stream_ends() {
        let bus = NotificationBus::new(1);
        let mut slow = bus.subscribe();
        bus.broadcast(ServerEvent::user_data_updated("lost"));

        assert_eq!(slow.recv().await, Some(ServerEvent::connected()));
        assert_eq!(slow.recv().await, None);
    }

    #[test]
    fn broadcast_with_no_subscribers_is_a_no_op() {
        let bus = NotificationBus::default();
        assert_eq!(bus.broadcast(ServerEvent::user_data_updated("x")), 0);
    }
}
