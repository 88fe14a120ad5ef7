//! WebSocket client connection state.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use courier_core::{ConnectionId, Token};
use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::mpsc;

/// A connected WebSocket client.
pub struct ClientConnection {
    /// Unique connection ID.
    pub id: ConnectionId,
    /// Tokens issued by `connect` calls made on this connection.
    tokens: Mutex<Vec<Token>>,
    /// Send channel to the client's WebSocket write task.
    tx: mpsc::Sender<String>,
    /// When this connection was established.
    pub connected_at: Instant,
    /// Whether the client has responded to the last ping.
    is_alive: AtomicBool,
    /// When the last pong (or any activity) was received.
    last_pong: Mutex<Instant>,
    /// Count of messages dropped due to full channel.
    dropped_messages: AtomicU64,
}

impl ClientConnection {
    /// Create a new connection.
    pub fn new(id: ConnectionId, tx: mpsc::Sender<String>) -> Self {
        let now = Instant::now();
        Self {
            id,
            tokens: Mutex::new(Vec::new()),
            tx,
            connected_at: now,
            is_alive: AtomicBool::new(true),
            last_pong: Mutex::new(now),
            dropped_messages: AtomicU64::new(0),
        }
    }

    /// Remember a session opened on this connection.
    pub fn bind_token(&self, token: Token) {
        self.tokens.lock().push(token);
    }

    /// Take every session token opened on this connection.
    pub fn take_tokens(&self) -> Vec<Token> {
        std::mem::take(&mut *self.tokens.lock())
    }

    /// Send a text message to the client.
    ///
    /// Returns `false` if the channel is full or closed.
    pub fn send(&self, message: String) -> bool {
        if self.tx.try_send(message).is_ok() {
            true
        } else {
            let _ = self.dropped_messages.fetch_add(1, Ordering::Relaxed);
            false
        }
    }

    /// Total messages dropped for this connection.
    pub fn drop_count(&self) -> u64 {
        self.dropped_messages.load(Ordering::Relaxed)
    }

    /// Mark the connection as alive (pong or other traffic received).
    pub fn mark_alive(&self) {
        self.is_alive.store(true, Ordering::Relaxed);
        *self.last_pong.lock() = Instant::now();
    }

    /// Duration since the last pong (or connection establishment).
    pub fn last_pong_elapsed(&self) -> Duration {
        self.last_pong.lock().elapsed()
    }

    /// Check and reset the alive flag for heartbeat.
    ///
    /// Returns `true` if the connection was alive since the last check.
    pub fn check_alive(&self) -> bool {
        self.is_alive.swap(false, Ordering::Relaxed)
    }

    /// Connection age.
    pub fn age(&self) -> Duration {
        self.connected_at.elapsed()
    }
}

/// Open connections, keyed by ID.
#[derive(Default)]
pub struct ConnectionRegistry {
    connections: DashMap<ConnectionId, Arc<ClientConnection>>,
}

impl ConnectionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Track `connection`.
    pub fn add(&self, connection: Arc<ClientConnection>) {
        let _ = self
            .connections
            .insert(connection.id.clone(), connection);
    }

    /// Stop tracking the connection with `id`.
    pub fn remove(&self, id: &ConnectionId) -> Option<Arc<ClientConnection>> {
        self.connections.remove(id).map(|(_, conn)| conn)
    }

    /// Number of open connections.
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    /// Whether there are no open connections.
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_connection() -> (ClientConnection, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(32);
        let conn = ClientConnection::new(ConnectionId::from("conn_1"), tx);
        (conn, rx)
    }

    #[tokio::test]
    async fn send_message_success() {
        let (conn, mut rx) = make_connection();
        assert!(conn.send("hello".into()));
        assert_eq!(rx.recv().await.unwrap(), "hello");
    }

    #[test]
    fn send_to_closed_channel_counts_drop() {
        let (conn, rx) = make_connection();
        drop(rx);
        assert!(!conn.send("hello".into()));
        assert_eq!(conn.drop_count(), 1);
    }

    #[test]
    fn send_to_full_channel_returns_false() {
        let (tx, _rx) = mpsc::channel(1);
        let conn = ClientConnection::new(ConnectionId::new(), tx);
        assert!(conn.send("msg1".into()));
        assert!(!conn.send("msg2".into()));
    }

    #[test]
    fn bind_and_take_tokens() {
        let (conn, _rx) = make_connection();
        assert!(conn.take_tokens().is_empty());
        conn.bind_token(Token::from("t1"));
        conn.bind_token(Token::from("t2"));
        assert_eq!(conn.take_tokens(), vec![Token::from("t1"), Token::from("t2")]);
        assert!(conn.take_tokens().is_empty());
    }

    #[test]
    fn check_alive_resets_flag() {
        let (conn, _rx) = make_connection();
        assert!(conn.check_alive());
        assert!(!conn.check_alive());
        conn.mark_alive();
        assert!(conn.check_alive());
    }

    #[test]
    fn registry_tracks_connections() {
        let registry = ConnectionRegistry::new();
        let (conn, _rx) = make_connection();
        let conn = Arc::new(conn);
        registry.add(Arc::clone(&conn));
        assert_eq!(registry.len(), 1);
        assert!(registry.remove(&conn.id).is_some());
        assert!(registry.is_empty());
        assert!(registry.remove(&conn.id).is_none());
    }
}
