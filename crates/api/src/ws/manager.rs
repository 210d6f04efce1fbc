use std::collections::{HashMap, HashSet};

use axum::body::Bytes;
use axum::extract::ws::Message;
use tokio::sync::{mpsc, RwLock};

use quill_core::collaboration::CollabMessage;
use quill_core::types::{DbId, Timestamp};

/// Channel sender half for pushing messages to a WebSocket connection.
pub type WsSender = mpsc::UnboundedSender<Message>;

/// Metadata for a single WebSocket connection.
pub struct WsConnection {
    /// Authenticated user behind this connection.
    pub user_id: DbId,
    /// Organization the connection is scoped to. Fan-out never crosses
    /// organization boundaries.
    pub organization_id: DbId,
    /// Channel sender for outbound messages to this connection.
    pub sender: WsSender,
    /// Documents this connection has joined (via `presence.join` or an
    /// active edit session). Only subscribed connections receive that
    /// document's broadcasts.
    pub subscriptions: HashSet<DbId>,
    /// When this connection was established.
    pub connected_at: Timestamp,
}

/// Manages all active WebSocket connections.
///
/// Thread-safe via interior `RwLock`; designed to be wrapped in `Arc` and
/// shared across the application.
pub struct WsManager {
    connections: RwLock<HashMap<String, WsConnection>>,
}

impl WsManager {
    /// Create a new, empty connection manager.
    pub fn new() -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
        }
    }

    /// Register a new authenticated connection.
    ///
    /// Returns the receiver half of the message channel so the caller can
    /// forward messages to the WebSocket sink.
    pub async fn add(
        &self,
        conn_id: String,
        user_id: DbId,
        organization_id: DbId,
    ) -> mpsc::UnboundedReceiver<Message> {
        let (tx, rx) = mpsc::unbounded_channel();
        let conn = WsConnection {
            user_id,
            organization_id,
            sender: tx,
            subscriptions: HashSet::new(),
            connected_at: chrono::Utc::now(),
        };
        self.connections.write().await.insert(conn_id, conn);
        rx
    }

    /// Remove a connection by its ID.
    pub async fn remove(&self, conn_id: &str) {
        self.connections.write().await.remove(conn_id);
    }

    /// Subscribe a connection to a document's broadcasts.
    pub async fn subscribe(&self, conn_id: &str, document_id: DbId) {
        if let Some(conn) = self.connections.write().await.get_mut(conn_id) {
            conn.subscriptions.insert(document_id);
        }
    }

    /// Unsubscribe a connection from a document's broadcasts.
    pub async fn unsubscribe(&self, conn_id: &str, document_id: DbId) {
        if let Some(conn) = self.connections.write().await.get_mut(conn_id) {
            conn.subscriptions.remove(&document_id);
        }
    }

    /// Send a protocol message to a single connection.
    ///
    /// Returns `false` if the connection is gone or its channel is closed.
    pub async fn send_to(&self, conn_id: &str, message: &CollabMessage) -> bool {
        let Ok(text) = serde_json::to_string(message) else {
            return false;
        };
        let conns = self.connections.read().await;
        match conns.get(conn_id) {
            Some(conn) => conn.sender.send(Message::Text(text.into())).is_ok(),
            None => false,
        }
    }

    /// Broadcast a protocol message to every connection subscribed to the
    /// given document within the given organization.
    ///
    /// Connections whose send channels are closed are silently skipped
    /// (they will be cleaned up on their next receive loop iteration).
    /// Returns the number of connections the message was sent to.
    pub async fn send_to_document(
        &self,
        organization_id: DbId,
        document_id: DbId,
        message: &CollabMessage,
    ) -> usize {
        let Ok(text) = serde_json::to_string(message) else {
            return 0;
        };
        let conns = self.connections.read().await;
        let mut count = 0;
        for conn in conns.values() {
            if conn.organization_id == organization_id
                && conn.subscriptions.contains(&document_id)
                && conn
                    .sender
                    .send(Message::Text(text.clone().into()))
                    .is_ok()
            {
                count += 1;
            }
        }
        count
    }

    /// Return the current number of active connections.
    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Send a Close frame to every connection, then clear the map.
    ///
    /// Used during graceful shutdown to notify all clients before the
    /// server stops accepting new connections.
    pub async fn shutdown_all(&self) {
        let mut conns = self.connections.write().await;
        let count = conns.len();
        for conn in conns.values() {
            let _ = conn.sender.send(Message::Close(None));
        }
        conns.clear();
        tracing::info!(count, "Closed all WebSocket connections");
    }

    /// Send a Ping frame to every connected client and drop connections
    /// whose send channels are already closed.
    ///
    /// Returns the number of dead connections pruned. A dead channel means
    /// the connection's forwarding task exited without running its cleanup,
    /// so pruning here is the backstop.
    pub async fn ping_all(&self) -> usize {
        let mut conns = self.connections.write().await;
        let before = conns.len();
        conns.retain(|conn_id, conn| {
            let alive = conn.sender.send(Message::Ping(Bytes::new())).is_ok();
            if !alive {
                tracing::debug!(conn_id = %conn_id, "Pruned dead WebSocket connection");
            }
            alive
        });
        before - conns.len()
    }
}

impl Default for WsManager {
    fn default() -> Self {
        Self::new()
    }
}
