use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{ConnectInfo, State};
use axum::response::Response;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use tokio::sync::mpsc;
use tokio::time::timeout;

use crate::api::ApiState;
use crate::config::Config;
use crate::data::FullSnapshot;
use crate::hub::Hub;
use crate::websocket::connection::ConnectionHandle;

#[derive(Debug, Clone, Copy)]
pub struct SubscriberSettings {
    /// Outbound messages a subscriber may have queued before it is dropped.
    pub buffer: usize,
    pub send_timeout: Duration,
    /// Whether arrays sent by a subscriber are re-broadcast to everyone.
    pub client_publish: bool,
}

impl From<&Config> for SubscriberSettings {
    fn from(config: &Config) -> Self {
        Self {
            buffer: config.subscriber_buffer,
            send_timeout: config.send_timeout,
            client_publish: config.client_publish,
        }
    }
}

// GET /ws
pub async fn websocket_upgrade(
    ws: WebSocketUpgrade,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    State(state): State<ApiState>,
) -> Response {
    info!("WebSocket connection request from {}", addr);

    let handler = WebSocketHandler::new(state.hub, state.subscriber, addr.to_string());
    ws.on_failed_upgrade(move |e| error!("WebSocket handshake failed for {}: {}", addr, e))
        .on_upgrade(move |socket| handler.handle_socket(socket))
}

pub struct WebSocketHandler {
    hub: Hub,
    settings: SubscriberSettings,
    peer_addr: String,
}

impl WebSocketHandler {
    pub fn new(hub: Hub, settings: SubscriberSettings, peer_addr: String) -> Self {
        Self {
            hub,
            settings,
            peer_addr,
        }
    }

    pub async fn handle_socket(self, socket: WebSocket) {
        let (write, read) = socket.split();
        let (handle, outbound_rx) = ConnectionHandle::new(self.peer_addr.clone(), self.settings.buffer);
        self.register(&handle);

        let write_task = self.spawn_write_task(write, outbound_rx, handle.clone());

        self.read_loop(read, &handle).await;

        // Sole removal path for subscribers that never fail a write
        self.hub.registry().remove(handle.id());
        if let Err(e) = write_task.await {
            error!("Write task for {} ended abnormally: {:?}", self.peer_addr, e);
        }

        info!(
            "Subscriber disconnected from {} ({} active)",
            self.peer_addr,
            self.hub.registry().len()
        );
    }

    /// Adds the handle to the registry, then queues the current snapshot on it.
    ///
    /// Registering before reading the store means a publish racing this call reaches the
    /// subscriber either through fan-out or through the join snapshot, possibly both.
    fn register(&self, handle: &Arc<ConnectionHandle>) {
        self.hub.registry().add(handle.clone());
        info!(
            "Subscriber connected from {} ({} active)",
            self.peer_addr,
            self.hub.registry().len()
        );

        let current = self.hub.store().current();
        if current.is_empty() {
            return;
        }

        match current.to_json() {
            Ok(json) => {
                let _ = handle.try_send(Arc::from(json));
            }
            Err(e) => error!("Failed to serialize current snapshot: {}", e),
        }
    }

    fn spawn_write_task(
        &self,
        mut write: SplitSink<WebSocket, Message>,
        mut outbound_rx: mpsc::Receiver<Arc<str>>,
        handle: Arc<ConnectionHandle>,
    ) -> tokio::task::JoinHandle<()> {
        let registry = self.hub.registry().clone();
        let send_timeout = self.settings.send_timeout;

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    message = outbound_rx.recv() => {
                        let Some(text) = message else { break };
                        match timeout(send_timeout, write.send(Message::Text(text.to_string()))).await {
                            Ok(Ok(())) => {}
                            Ok(Err(e)) => {
                                error!("Error sending message to {}: {}", handle.peer_addr(), e);
                                break;
                            }
                            Err(_) => {
                                warn!(
                                    "Send to {} exceeded {:?}, dropping subscriber",
                                    handle.peer_addr(),
                                    send_timeout
                                );
                                break;
                            }
                        }
                    }
                    _ = handle.closed() => {
                        debug!("Closing socket for {}", handle.peer_addr());
                        let _ = timeout(send_timeout, write.send(Message::Close(None))).await;
                        break;
                    }
                }
            }

            // Also wakes the read loop if it is still waiting on the socket
            registry.remove(handle.id());
        })
    }

    async fn read_loop(&self, mut read: SplitStream<WebSocket>, handle: &ConnectionHandle) {
        loop {
            let frame = tokio::select! {
                frame = read.next() => frame,
                _ = handle.closed() => {
                    debug!("Read loop for {} stopped by close", self.peer_addr);
                    break;
                }
            };

            let decoded = match frame {
                Some(Ok(Message::Text(text))) => FullSnapshot::from_json(&text),
                Some(Ok(Message::Binary(data))) => FullSnapshot::from_slice(&data),
                Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => {
                    debug!("Received ping/pong from {}", self.peer_addr);
                    continue;
                }
                Some(Ok(Message::Close(frame))) => {
                    info!("Received close frame from {}: {:?}", self.peer_addr, frame);
                    handle.begin_close();
                    break;
                }
                Some(Err(e)) => {
                    error!("Error reading message from {}: {}", self.peer_addr, e);
                    break;
                }
                None => break,
            };

            match decoded {
                Ok(snapshot) => self.forward(snapshot),
                Err(e) => {
                    warn!("Error reading JSON from {}: {}", self.peer_addr, e);
                    break;
                }
            }
        }
    }

    fn forward(&self, snapshot: FullSnapshot) {
        if !self.settings.client_publish {
            debug!("Ignoring {} instruments from {}: client publishing is disabled", snapshot.len(), self.peer_addr);
            return;
        }

        debug!("Re-broadcasting {} instruments from {}", snapshot.len(), self.peer_addr);
        if !self.hub.enqueue(Arc::new(snapshot)) {
            warn!("Broadcast queue is closed; dropping message from {}", self.peer_addr);
        }
    }
}
