use std::sync::Arc;
use log::{debug, error, info, warn};

use crate::data::FullSnapshot;
use crate::hub::{BroadcastQueue, Hub};
use crate::websocket::connection::SendFailure;
use crate::websocket::registry::ConnectionRegistry;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: usize,
    pub dropped: usize,
}

/// Single consumer of the broadcast queue; fans each message out to every registered subscriber.
pub struct Broadcaster {
    registry: Arc<ConnectionRegistry>,
    queue: BroadcastQueue,
}

impl Broadcaster {
    pub fn new(hub: &Hub, queue: BroadcastQueue) -> Self {
        Self {
            registry: hub.registry().clone(),
            queue,
        }
    }

    /// Runs until every queue sender has been dropped.
    pub async fn run(mut self) {
        info!("Broadcaster started");

        while let Some(message) = self.queue.recv().await {
            let report = self.broadcast_once(&message);
            if report.delivered > 0 || report.dropped > 0 {
                info!(
                    "Broadcasted {} instruments to {} subscribers ({} dropped)",
                    message.len(),
                    report.delivered,
                    report.dropped
                );
            }
        }

        info!("Broadcast queue closed, broadcaster stopping");
    }

    /// One fan-out round. A failing subscriber is removed and the round carries on.
    pub fn broadcast_once(&self, message: &FullSnapshot) -> BroadcastReport {
        let text: Arc<str> = match message.to_json() {
            Ok(json) => Arc::from(json),
            Err(e) => {
                error!("Failed to serialize snapshot for broadcast: {}", e);
                return BroadcastReport::default();
            }
        };

        let mut report = BroadcastReport::default();
        self.registry.for_each(|handle| match handle.try_send(text.clone()) {
            Ok(()) => report.delivered += 1,
            Err(failure) => {
                match failure {
                    SendFailure::Full => warn!(
                        "Subscriber {} is not keeping up, dropping connection",
                        handle.peer_addr()
                    ),
                    SendFailure::Closed => debug!(
                        "Subscriber {} already closed, removing",
                        handle.peer_addr()
                    ),
                }
                self.registry.remove(handle.id());
                report.dropped += 1;
            }
        });

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::InstrumentSnapshot;
    use crate::websocket::connection::{ConnectionHandle, ConnectionState};

    fn snapshot(symbols: &[&str]) -> Arc<FullSnapshot> {
        Arc::new(FullSnapshot::new(
            symbols
                .iter()
                .map(|s| InstrumentSnapshot {
                    symbol: s.to_string(),
                    open_price: 10.0,
                    current_price: 11.0,
                    refresh_interval_hint: 2,
                })
                .collect(),
        ))
    }

    #[test]
    fn test_failed_subscriber_is_pruned_others_receive_once() {
        let (hub, queue) = Hub::new();
        let broadcaster = Broadcaster::new(&hub, queue);

        let (a, mut a_rx) = ConnectionHandle::new("a", 8);
        let (b, b_rx) = ConnectionHandle::new("b", 8);
        let (c, mut c_rx) = ConnectionHandle::new("c", 8);
        for h in [&a, &b, &c] {
            hub.registry().add(h.clone());
        }
        drop(b_rx);

        let report = broadcaster.broadcast_once(&snapshot(&["AAA"]));
        assert_eq!(report, BroadcastReport { delivered: 2, dropped: 1 });

        assert_eq!(hub.registry().len(), 2);
        assert!(hub.registry().contains(a.id()));
        assert!(!hub.registry().contains(b.id()));
        assert!(hub.registry().contains(c.id()));
        assert_eq!(b.state(), ConnectionState::Closed);

        for rx in [&mut a_rx, &mut c_rx] {
            let text = rx.try_recv().unwrap();
            let parsed = FullSnapshot::from_json(&text).unwrap();
            assert_eq!(parsed.instruments()[0].symbol, "AAA");
            assert!(rx.try_recv().is_err());
        }
    }

    #[test]
    fn test_slow_subscriber_is_dropped() {
        let (hub, queue) = Hub::new();
        let broadcaster = Broadcaster::new(&hub, queue);

        let (slow, _slow_rx) = ConnectionHandle::new("slow", 1);
        let (fast, mut fast_rx) = ConnectionHandle::new("fast", 8);
        hub.registry().add(slow.clone());
        hub.registry().add(fast.clone());

        broadcaster.broadcast_once(&snapshot(&["A"]));
        fast_rx.try_recv().unwrap();
        let report = broadcaster.broadcast_once(&snapshot(&["B"]));

        assert_eq!(report, BroadcastReport { delivered: 1, dropped: 1 });
        assert!(!hub.registry().contains(slow.id()));
        assert!(hub.registry().contains(fast.id()));
    }

    #[tokio::test]
    async fn test_run_delivers_in_enqueue_order() {
        let (hub, queue) = Hub::new();
        let (a, mut a_rx) = ConnectionHandle::new("a", 16);
        hub.registry().add(a.clone());

        let task = tokio::spawn(Broadcaster::new(&hub, queue).run());

        for symbol in ["ONE", "TWO", "THREE"] {
            hub.enqueue(snapshot(&[symbol]));
        }

        for expected in ["ONE", "TWO", "THREE"] {
            let text = a_rx.recv().await.unwrap();
            let parsed = FullSnapshot::from_json(&text).unwrap();
            assert_eq!(parsed.instruments()[0].symbol, expected);
        }

        drop(hub);
        task.await.unwrap();
    }
}
