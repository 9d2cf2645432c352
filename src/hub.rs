use std::sync::Arc;
use tokio::sync::mpsc;

use crate::data::{FullSnapshot, SnapshotStore};
use crate::websocket::ConnectionRegistry;

/// Receiving end of the broadcast queue. Owned by the broadcaster.
pub type BroadcastQueue = mpsc::UnboundedReceiver<Arc<FullSnapshot>>;

/// Shared state of the service, built once at startup and handed to every component.
#[derive(Clone)]
pub struct Hub {
    store: Arc<SnapshotStore>,
    registry: Arc<ConnectionRegistry>,
    queue: mpsc::UnboundedSender<Arc<FullSnapshot>>,
}

impl Hub {
    pub fn new() -> (Self, BroadcastQueue) {
        let (queue, queue_rx) = mpsc::unbounded_channel();
        let hub = Self {
            store: Arc::new(SnapshotStore::new()),
            registry: Arc::new(ConnectionRegistry::new()),
            queue,
        };
        (hub, queue_rx)
    }

    pub fn store(&self) -> &Arc<SnapshotStore> {
        &self.store
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Makes the snapshot current and queues it for fan-out.
    pub fn publish(&self, snapshot: Arc<FullSnapshot>) -> bool {
        self.store.publish(snapshot.clone());
        self.enqueue(snapshot)
    }

    /// Queues a message for fan-out without touching the store. False once the broadcaster is gone.
    pub fn enqueue(&self, message: Arc<FullSnapshot>) -> bool {
        self.queue.send(message).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::InstrumentSnapshot;

    fn snapshot(symbol: &str) -> Arc<FullSnapshot> {
        Arc::new(FullSnapshot::new(vec![InstrumentSnapshot {
            symbol: symbol.to_string(),
            open_price: 1.0,
            current_price: 1.0,
            refresh_interval_hint: 1,
        }]))
    }

    #[test]
    fn test_publish_updates_store_and_queue() {
        let (hub, mut queue) = Hub::new();
        assert!(hub.publish(snapshot("AAA")));

        assert_eq!(hub.store().current().instruments()[0].symbol, "AAA");
        assert_eq!(queue.try_recv().unwrap().instruments()[0].symbol, "AAA");
    }

    #[test]
    fn test_enqueue_leaves_store_alone() {
        let (hub, mut queue) = Hub::new();
        assert!(hub.enqueue(snapshot("BBB")));

        assert!(hub.store().current().is_empty());
        assert_eq!(queue.try_recv().unwrap().instruments()[0].symbol, "BBB");
    }

    #[test]
    fn test_enqueue_fails_without_consumer() {
        let (hub, queue) = Hub::new();
        drop(queue);
        assert!(!hub.enqueue(snapshot("CCC")));
    }
}
