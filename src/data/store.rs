use std::sync::{Arc, PoisonError, RwLock};

use crate::data::model::FullSnapshot;

/// Holds the single current snapshot. Writers swap the pointer, readers clone it.
pub struct SnapshotStore {
    current: RwLock<Arc<FullSnapshot>>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self {
            current: RwLock::new(Arc::new(FullSnapshot::empty())),
        }
    }

    pub fn publish(&self, snapshot: Arc<FullSnapshot>) {
        // A poisoned lock still guards a complete Arc, so keep going.
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        *current = snapshot;
    }

    pub fn current(&self) -> Arc<FullSnapshot> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Default for SnapshotStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::InstrumentSnapshot;

    fn snapshot_of(symbols: &[&str], price: f64) -> Arc<FullSnapshot> {
        Arc::new(FullSnapshot::new(
            symbols
                .iter()
                .map(|s| InstrumentSnapshot {
                    symbol: s.to_string(),
                    open_price: price,
                    current_price: price,
                    refresh_interval_hint: 1,
                })
                .collect(),
        ))
    }

    #[test]
    fn test_store_starts_empty() {
        let store = SnapshotStore::new();
        assert!(store.current().is_empty());
    }

    #[test]
    fn test_publish_replaces_wholesale() {
        let store = SnapshotStore::new();
        store.publish(snapshot_of(&["AAA", "BBB", "CCC"], 1.0));
        store.publish(snapshot_of(&["DDD"], 2.0));

        let current = store.current();
        assert_eq!(current.len(), 1);
        assert_eq!(current.instruments()[0].symbol, "DDD");
    }

    #[test]
    fn test_concurrent_readers_never_see_a_mix() {
        let store = Arc::new(SnapshotStore::new());
        let old = snapshot_of(&["A", "B", "C", "D"], 1.0);
        let new = snapshot_of(&["E", "F", "G", "H"], 2.0);
        store.publish(old.clone());

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for _ in 0..1_000 {
                        let seen = store.current();
                        let prices: Vec<f64> =
                            seen.instruments().iter().map(|i| i.open_price).collect();
                        assert!(prices == vec![1.0; 4] || prices == vec![2.0; 4]);
                    }
                })
            })
            .collect();

        for i in 0..1_000 {
            store.publish(if i % 2 == 0 { new.clone() } else { old.clone() });
        }

        for reader in readers {
            reader.join().unwrap();
        }
    }
}
