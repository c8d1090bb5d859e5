//! Mutation fan-out to attached WebSocket connections.
//!
//! The [`Broadcaster`] owns the connection registry. A broadcast snapshots the
//! registry under a short read lock, then pushes to each connection outside
//! the lock. Pushes are non-blocking: a full or closed queue is a drop for
//! that connection only, and a connection that keeps dropping is detached.

use std::collections::HashMap;
use std::sync::Arc;

use metrics::{counter, gauge};
use parking_lot::RwLock;
use taskhub_core::events::{TASK_UPDATE, UPDATE_TASK_NOTICE};
use taskhub_core::ids::ConnectionId;
use taskhub_core::{Envelope, MutationEvent};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::connection::ClientConnection;
use super::notice::{AllowAll, NoticeGate};

/// Default dropped-frame limit before a slow client is detached.
pub const DEFAULT_MAX_DROPPED: u64 = 100;

/// Broadcaster tuning.
#[derive(Debug, Clone)]
pub struct BroadcastConfig {
    /// Dropped frames tolerated per connection before it is detached.
    pub max_dropped_messages: u64,
    /// Deliver relayed notices back to the connection that sent them.
    pub echo_notices_to_sender: bool,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            max_dropped_messages: DEFAULT_MAX_DROPPED,
            echo_notices_to_sender: true,
        }
    }
}

/// Why a connection could not be attached.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AttachError {
    /// A live connection with this ID is already registered.
    #[error("connection {0} is already attached")]
    Duplicate(ConnectionId),
    /// The connection already reached its terminal state.
    #[error("connection {0} is detached")]
    Detached(ConnectionId),
}

/// Outcome of one broadcast.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Connections in the snapshot.
    pub recipients: usize,
    /// Frames queued successfully.
    pub delivered: usize,
    /// Frames that could not be queued.
    pub dropped: usize,
    /// Connections detached for exceeding the drop limit.
    pub evicted: usize,
}

/// Result of relaying a client notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeOutcome {
    /// Re-broadcast as `task_update`.
    Relayed(DeliveryReport),
    /// Refused by the [`NoticeGate`].
    Rejected,
    /// Not a relayable notice kind.
    Ignored,
}

/// Process-wide fan-out hub and connection registry.
pub struct Broadcaster {
    connections: RwLock<HashMap<ConnectionId, Arc<ClientConnection>>>,
    config: BroadcastConfig,
    gate: Arc<dyn NoticeGate>,
}

impl Broadcaster {
    /// Create a broadcaster that admits every client notice.
    pub fn new(config: BroadcastConfig) -> Self {
        Self::with_gate(config, Arc::new(AllowAll))
    }

    /// Create a broadcaster with a custom notice gate.
    pub fn with_gate(config: BroadcastConfig, gate: Arc<dyn NoticeGate>) -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
            config,
            gate,
        }
    }

    /// Register a live connection.
    pub fn attach(&self, connection: Arc<ClientConnection>) -> Result<(), AttachError> {
        if connection.is_detached() {
            return Err(AttachError::Detached(connection.id.clone()));
        }
        let mut conns = self.connections.write();
        if conns.contains_key(&connection.id) {
            return Err(AttachError::Duplicate(connection.id.clone()));
        }
        let id = connection.id.clone();
        let _ = conns.insert(id.clone(), connection);
        let total = conns.len();
        drop(conns);

        counter!("taskhub_ws_attach_total").increment(1);
        gauge!("taskhub_ws_connections_active").increment(1.0);
        debug!(conn_id = %id, total, "connection attached");
        Ok(())
    }

    /// Remove a connection and move it to `Detached`.
    ///
    /// Idempotent: returns `None` if it was not registered.
    pub fn detach(&self, id: &ConnectionId) -> Option<Arc<ClientConnection>> {
        let removed = self.connections.write().remove(id);
        if let Some(conn) = &removed {
            let _ = conn.mark_detached();
            counter!("taskhub_ws_detach_total").increment(1);
            gauge!("taskhub_ws_connections_active").decrement(1.0);
            debug!(conn_id = %id, dropped = conn.drop_count(), "connection detached");
        }
        removed
    }

    /// Number of attached connections.
    pub fn connection_count(&self) -> usize {
        self.connections.read().len()
    }

    /// Whether `id` is currently attached.
    pub fn is_attached(&self, id: &ConnectionId) -> bool {
        self.connections.read().contains_key(id)
    }

    /// Deliver an envelope to every attached connection.
    pub fn broadcast(&self, envelope: &Envelope) -> DeliveryReport {
        self.fan_out(envelope, None)
    }

    /// Encode a typed event and broadcast it.
    pub fn broadcast_event(&self, event: &MutationEvent) -> DeliveryReport {
        match event.to_envelope() {
            Ok(envelope) => self.broadcast(&envelope),
            Err(e) => {
                warn!(kind = event.kind(), error = %e, "failed to encode mutation event");
                DeliveryReport::default()
            }
        }
    }

    /// Relay a client `update_task` notice as a `task_update` broadcast.
    ///
    /// The payload is forwarded verbatim. Whether the sender receives its own
    /// notice back follows [`BroadcastConfig::echo_notices_to_sender`].
    pub fn relay_notice(&self, origin: &ConnectionId, notice: &Envelope) -> NoticeOutcome {
        if notice.kind != UPDATE_TASK_NOTICE {
            return NoticeOutcome::Ignored;
        }
        if !self.gate.admit(origin, notice) {
            info!(conn_id = %origin, "client notice rejected");
            return NoticeOutcome::Rejected;
        }
        let relayed = Envelope::new(TASK_UPDATE, notice.data.clone());
        let skip = (!self.config.echo_notices_to_sender).then_some(origin);
        NoticeOutcome::Relayed(self.fan_out(&relayed, skip))
    }

    fn fan_out(&self, envelope: &Envelope, skip: Option<&ConnectionId>) -> DeliveryReport {
        let json = match envelope.to_json() {
            Ok(j) => Arc::new(j),
            Err(e) => {
                warn!(kind = %envelope.kind, error = %e, "failed to serialize envelope");
                return DeliveryReport::default();
            }
        };

        let snapshot: Vec<Arc<ClientConnection>> = {
            let conns = self.connections.read();
            conns
                .values()
                .filter(|c| skip != Some(&c.id))
                .cloned()
                .collect()
        };

        let mut report = DeliveryReport {
            recipients: snapshot.len(),
            ..DeliveryReport::default()
        };
        let mut slow = Vec::new();

        for conn in &snapshot {
            if conn.send(Arc::clone(&json)) {
                report.delivered += 1;
            } else {
                report.dropped += 1;
                if conn.drop_count() >= self.config.max_dropped_messages {
                    slow.push(conn.id.clone());
                }
            }
        }

        for id in slow {
            if self.detach(&id).is_some() {
                warn!(conn_id = %id, "detaching slow client");
                report.evicted += 1;
            }
        }

        counter!("taskhub_broadcasts_total", "kind" => envelope.kind.clone()).increment(1);
        if report.dropped > 0 {
            counter!("taskhub_broadcast_drops_total").increment(report.dropped as u64);
        }
        debug!(
            kind = %envelope.kind,
            recipients = report.recipients,
            delivered = report.delivered,
            dropped = report.dropped,
            "broadcast"
        );
        report
    }
}

impl Default for Broadcaster {
    fn default() -> Self {
        Self::new(BroadcastConfig::default())
    }
}
