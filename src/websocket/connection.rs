use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::watch;
use uuid::Uuid;

pub type ConnectionId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Open,
    /// Winding down; no longer accepts sends but may still be registered.
    Closing,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendFailure {
    /// Outbound buffer is full: the subscriber is not keeping up.
    Full,
    Closed,
}

/// The registry's view of one subscriber: identity, enqueue-or-fail sender and liveness.
#[derive(Debug)]
pub struct ConnectionHandle {
    id: ConnectionId,
    peer_addr: String,
    outbound: mpsc::Sender<Arc<str>>,
    state: watch::Sender<ConnectionState>,
}

impl ConnectionHandle {
    /// Returns the handle plus the receiving end of its outbound buffer, which the writer drains.
    pub fn new(peer_addr: impl Into<String>, buffer: usize) -> (Arc<Self>, mpsc::Receiver<Arc<str>>) {
        let (outbound, outbound_rx) = mpsc::channel(buffer.max(1));
        let (state, _) = watch::channel(ConnectionState::Open);

        let handle = Arc::new(Self {
            id: Uuid::new_v4(),
            peer_addr: peer_addr.into(),
            outbound,
            state,
        });

        (handle, outbound_rx)
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn peer_addr(&self) -> &str {
        &self.peer_addr
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn is_open(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    pub fn try_send(&self, message: Arc<str>) -> Result<(), SendFailure> {
        if !self.is_open() {
            return Err(SendFailure::Closed);
        }

        self.outbound.try_send(message).map_err(|e| match e {
            TrySendError::Full(_) => SendFailure::Full,
            TrySendError::Closed(_) => SendFailure::Closed,
        })
    }

    /// Open -> Closing. Returns false if the handle was already past Open.
    pub fn begin_close(&self) -> bool {
        self.state.send_if_modified(|state| {
            if *state == ConnectionState::Open {
                *state = ConnectionState::Closing;
                true
            } else {
                false
            }
        })
    }

    /// Moves to Closed. Idempotent.
    pub fn close(&self) -> bool {
        self.state.send_if_modified(|state| {
            if *state == ConnectionState::Closed {
                false
            } else {
                *state = ConnectionState::Closed;
                true
            }
        })
    }

    /// Resolves once the handle leaves Open.
    pub async fn closed(&self) {
        let mut state = self.state.subscribe();
        let _ = state.wait_for(|s| *s != ConnectionState::Open).await;
    }
}
