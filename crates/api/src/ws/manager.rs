use std::collections::HashMap;

use axum::body::Bytes;
use axum::extract::ws::Message;
use calibra_core::types::Timestamp;
use tokio::sync::{mpsc, RwLock};

/// Channel sender half for pushing messages to a WebSocket connection.
pub type WsSender = mpsc::UnboundedSender<Message>;

/// A registered browser connection.
pub struct WsConnection {
    pub sender: WsSender,
    pub connected_at: Timestamp,
}

/// All active WebSocket connections, keyed by connection id.
///
/// Shared as `Arc<WsManager>`; the map sits behind a tokio `RwLock` so
/// broadcasts only take the read side.
pub struct WsManager {
    connections: RwLock<HashMap<String, WsConnection>>,
}

impl WsManager {
    pub fn new() -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
        }
    }

    /// Register a connection and return the receiver its writer task drains.
    pub async fn add(&self, conn_id: String) -> mpsc::UnboundedReceiver<Message> {
        let (tx, rx) = mpsc::unbounded_channel();
        let conn = WsConnection {
            sender: tx,
            connected_at: chrono::Utc::now(),
        };
        self.connections.write().await.insert(conn_id, conn);
        rx
    }

    pub async fn remove(&self, conn_id: &str) {
        self.connections.write().await.remove(conn_id);
    }

    /// Send `message` to every connection.
    ///
    /// Returns how many channels accepted it. Closed channels are skipped;
    /// their receive loop removes them.
    pub async fn broadcast(&self, message: Message) -> usize {
        let conns = self.connections.read().await;
        conns
            .values()
            .filter(|conn| conn.sender.send(message.clone()).is_ok())
            .count()
    }

    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Send a Close frame to every connection, then clear the map.
    pub async fn shutdown_all(&self) {
        let mut conns = self.connections.write().await;
        let count = conns.len();
        for conn in conns.values() {
            let _ = conn.sender.send(Message::Close(None));
        }
        conns.clear();
        tracing::info!(count, "Closed all WebSocket connections");
    }

    /// Ping every client and drop connections whose writer is gone.
    ///
    /// Returns the number of pruned connections. A writer task exits when
    /// its sink fails, which closes the channel, so a failed send here means
    /// the receive loop never got to call [`WsManager::remove`].
    pub async fn ping_and_prune(&self) -> usize {
        let mut conns = self.connections.write().await;
        let before = conns.len();
        conns.retain(|_, conn| conn.sender.send(Message::Ping(Bytes::new())).is_ok());
        before - conns.len()
    }
}

impl Default for WsManager {
    fn default() -> Self {
        Self::new()
    }
}
