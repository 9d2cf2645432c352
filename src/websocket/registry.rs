use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use log::info;

use crate::websocket::connection::{ConnectionHandle, ConnectionId};

/// Lock-protected set of live subscriber connections.
pub struct ConnectionRegistry {
    connections: Mutex<HashMap<ConnectionId, Arc<ConnectionHandle>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            connections: Mutex::new(HashMap::new()),
        }
    }

    // Map operations never leave it half-updated, so a poisoned lock is still usable.
    fn lock(&self) -> MutexGuard<'_, HashMap<ConnectionId, Arc<ConnectionHandle>>> {
        self.connections.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers an open handle. Closed or already-present handles are ignored.
    pub fn add(&self, handle: Arc<ConnectionHandle>) -> bool {
        let mut connections = self.lock();
        if !handle.is_open() || connections.contains_key(&handle.id()) {
            return false;
        }

        connections.insert(handle.id(), handle);
        true
    }

    /// Removes and closes the handle in one step. No-op for unknown ids.
    pub fn remove(&self, id: ConnectionId) -> bool {
        let mut connections = self.lock();
        match connections.remove(&id) {
            Some(handle) => {
                handle.close();
                true
            }
            None => false,
        }
    }

    /// Applies `f` to the members present when the call began.
    ///
    /// The lock is released before `f` runs, so `f` may add or remove connections.
    pub fn for_each<F>(&self, mut f: F)
    where
        F: FnMut(&Arc<ConnectionHandle>),
    {
        for handle in self.members() {
            f(&handle);
        }
    }

    pub fn members(&self) -> Vec<Arc<ConnectionHandle>> {
        self.lock().values().cloned().collect()
    }

    pub fn contains(&self, id: ConnectionId) -> bool {
        self.lock().contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn close_all(&self) -> usize {
        let mut connections = self.lock();
        let count = connections.len();
        for (_, handle) in connections.drain() {
            handle.close();
        }

        if count > 0 {
            info!("Closed {} subscriber connections", count);
        }
        count
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
