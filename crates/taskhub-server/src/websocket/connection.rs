//! Live WebSocket connection state.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use taskhub_core::ids::ConnectionId;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Attachment state of a connection. `Detached` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachState {
    /// Member of the broadcast registry.
    Attached,
    /// Closed or broken; never re-attached.
    Detached,
}

/// One connected client.
///
/// Outbound frames go through a bounded channel drained by the session's
/// writer task, so pushing never waits on the socket.
pub struct ClientConnection {
    /// Unique connection ID.
    pub id: ConnectionId,
    tx: mpsc::Sender<Arc<String>>,
    /// When the transport session was established.
    pub connected_at: Instant,
    /// Wall-clock attach time, for logs and diagnostics.
    pub attached_at: DateTime<Utc>,
    /// `Origin` header presented at upgrade, if any.
    pub origin: Option<String>,
    is_alive: AtomicBool,
    last_pong: Mutex<Instant>,
    dropped_messages: AtomicU64,
    detached: AtomicBool,
    closed: CancellationToken,
}

impl ClientConnection {
    /// Create a connection. `closed` is cancelled when the connection detaches.
    pub fn new(
        id: ConnectionId,
        tx: mpsc::Sender<Arc<String>>,
        origin: Option<String>,
        closed: CancellationToken,
    ) -> Self {
        let now = Instant::now();
        Self {
            id,
            tx,
            connected_at: now,
            attached_at: Utc::now(),
            origin,
            is_alive: AtomicBool::new(true),
            last_pong: Mutex::new(now),
            dropped_messages: AtomicU64::new(0),
            detached: AtomicBool::new(false),
            closed,
        }
    }

    /// Queue a text frame.
    ///
    /// Returns `false` if the connection is detached, or its queue is full
    /// or closed; the latter two increment the dropped message counter.
    pub fn send(&self, message: Arc<String>) -> bool {
        if self.is_detached() {
            return false;
        }
        if self.tx.try_send(message).is_ok() {
            true
        } else {
            let _ = self.dropped_messages.fetch_add(1, Ordering::Relaxed);
            false
        }
    }

    /// Total frames dropped for this connection.
    pub fn drop_count(&self) -> u64 {
        self.dropped_messages.load(Ordering::Relaxed)
    }

    /// Current attachment state.
    pub fn state(&self) -> AttachState {
        if self.is_detached() {
            AttachState::Detached
        } else {
            AttachState::Attached
        }
    }

    /// Whether the connection has reached its terminal state.
    pub fn is_detached(&self) -> bool {
        self.detached.load(Ordering::Acquire)
    }

    /// Move to `Detached` and signal the session to close.
    ///
    /// Returns `true` only for the call that performed the transition.
    pub fn mark_detached(&self) -> bool {
        let first = !self.detached.swap(true, Ordering::AcqRel);
        if first {
            self.closed.cancel();
        }
        first
    }

    /// Token cancelled once the connection detaches or the server shuts down.
    pub fn closed_token(&self) -> CancellationToken {
        self.closed.clone()
    }

    /// Record inbound activity (pong or any frame).
    pub fn mark_alive(&self) {
        self.is_alive.store(true, Ordering::Relaxed);
        *self.last_pong.lock() = Instant::now();
    }

    /// Check and reset the alive flag.
    ///
    /// Returns `true` if the client showed activity since the last check.
    pub fn check_alive(&self) -> bool {
        self.is_alive.swap(false, Ordering::Relaxed)
    }

    /// Time since the last recorded activity.
    pub fn last_pong_elapsed(&self) -> Duration {
        self.last_pong.lock().elapsed()
    }

    /// Connection age.
    pub fn age(&self) -> Duration {
        self.connected_at.elapsed()
    }
}

impl std::fmt::Debug for ClientConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConnection")
            .field("id", &self.id)
            .field("state", &self.state())
            .field("dropped", &self.drop_count())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_connection(capacity: usize) -> (ClientConnection, mpsc::Receiver<Arc<String>>) {
        let (tx, rx) = mpsc::channel(capacity);
        let conn = ClientConnection::new(
            ConnectionId::from_raw("conn_1"),
            tx,
            None,
            CancellationToken::new(),
        );
        (conn, rx)
    }

    #[tokio::test]
    async fn send_message_success() {
        let (conn, mut rx) = make_connection(8);
        assert!(conn.send(Arc::new("hello".into())));
        assert_eq!(&*rx.recv().await.unwrap(), "hello");
    }

    #[test]
    fn send_to_closed_channel_counts_drop() {
        let (conn, rx) = make_connection(8);
        drop(rx);
        assert!(!conn.send(Arc::new("hello".into())));
        assert_eq!(conn.drop_count(), 1);
    }

    #[test]
    fn send_to_full_channel_counts_drop() {
        let (conn, _rx) = make_connection(1);
        assert!(conn.send(Arc::new("msg1".into())));
        assert!(!conn.send(Arc::new("msg2".into())));
        assert_eq!(conn.drop_count(), 1);
    }

    #[tokio::test]
    async fn messages_arrive_in_order() {
        let (conn, mut rx) = make_connection(8);
        for i in 0..5 {
            assert!(conn.send(Arc::new(format!("msg_{i}"))));
        }
        for i in 0..5 {
            assert_eq!(&*rx.recv().await.unwrap(), &format!("msg_{i}"));
        }
    }

    #[test]
    fn detach_is_terminal_and_single_shot() {
        let (conn, _rx) = make_connection(8);
        let token = conn.closed_token();
        assert_eq!(conn.state(), AttachState::Attached);
        assert!(conn.mark_detached());
        assert!(!conn.mark_detached());
        assert_eq!(conn.state(), AttachState::Detached);
        assert!(token.is_cancelled());
    }

    #[test]
    fn detached_connection_refuses_sends_without_counting() {
        let (conn, _rx) = make_connection(8);
        let _ = conn.mark_detached();
        assert!(!conn.send(Arc::new("late".into())));
        assert_eq!(conn.drop_count(), 0);
    }

    #[test]
    fn mark_alive_and_check() {
        let (conn, _rx) = make_connection(8);
        assert!(conn.check_alive());
        assert!(!conn.check_alive());
        conn.mark_alive();
        assert!(conn.check_alive());
    }

    #[test]
    fn debug_output_includes_state() {
        let (conn, _rx) = make_connection(8);
        let debug = format!("{conn:?}");
        assert!(debug.contains("conn_1"));
        assert!(debug.contains("Attached"));
    }
}
