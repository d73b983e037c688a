//! Connection registry.
//!
//! Tracks the currently open client connections and relays frames between
//! them. Purely in-memory: the membership set is rebuilt empty on every
//! process start.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::mpsc;

use crate::envelope::Frame;
use crate::error::RelayError;

/// Sender half of a connection's outbound frame channel.
///
/// Unbounded, so a broadcast never suspends on a slow recipient; the
/// recipient's own writer task drains the channel at its own pace.
pub type FrameSender = mpsc::UnboundedSender<Frame>;

/// Server-assigned identifier for one connection.
pub type ConnectionId = String;

/// A single registered connection.
#[derive(Debug)]
pub struct Connection {
    /// Unique identifier for this connection
    pub id: ConnectionId,
    /// Transport-reported peer address, for logging only
    pub remote: String,
    /// Channel draining into this connection's writer task
    pub sender: FrameSender,
}

/// The membership set of currently open connections.
///
/// Thread-safe and shared across sessions via `Arc`. Registration and
/// deregistration are serialized per entry; broadcasts work from a stable
/// snapshot and never hold the map while sending.
#[derive(Debug, Default)]
pub struct Registry {
    connections: DashMap<ConnectionId, Connection>,
}

impl Registry {
    /// Create a new, empty registry.
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
        }
    }

    /// Create a new registry wrapped in `Arc` for sharing.
    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Register a connection; subsequent broadcasts include it.
    ///
    /// Returns the assigned connection ID.
    pub fn register(&self, remote: impl Into<String>, sender: FrameSender) -> ConnectionId {
        let id = uuid::Uuid::new_v4().to_string();
        let remote = remote.into();

        self.connections.insert(
            id.clone(),
            Connection {
                id: id.clone(),
                remote: remote.clone(),
                sender,
            },
        );

        tracing::info!(conn_id = %id, %remote, "connection registered");

        id
    }

    /// Remove a connection.
    ///
    /// A no-op when the ID is already gone, so racing removals during a
    /// concurrent shutdown are harmless.
    pub fn deregister(&self, id: &str) {
        if let Some((_, conn)) = self.connections.remove(id) {
            tracing::info!(conn_id = %id, remote = %conn.remote, "connection deregistered");
        }
    }

    /// Relay `frame` to every registered connection except `sender_id`.
    ///
    /// Takes a stable snapshot of the membership before sending, so a
    /// connection added or removed mid-broadcast is deterministically
    /// included or excluded. A failed send to one recipient is logged and
    /// skipped; it never aborts delivery to the rest and never reaches the
    /// sender.
    ///
    /// Returns the number of recipients the frame was delivered to.
    pub fn broadcast(&self, sender_id: &str, frame: &Frame) -> usize {
        let recipients: Vec<(ConnectionId, FrameSender)> = self
            .connections
            .iter()
            .filter(|entry| entry.key() != sender_id)
            .map(|entry| (entry.key().clone(), entry.value().sender.clone()))
            .collect();

        let mut delivered = 0;
        for (id, sender) in recipients {
            match Self::send_frame(&sender, &id, frame.clone()) {
                Ok(()) => delivered += 1,
                Err(err) => {
                    tracing::debug!(%err, "skipping broadcast recipient");
                }
            }
        }

        tracing::debug!(
            sender = %sender_id,
            recipients = delivered,
            "frame relayed to connections"
        );

        delivered
    }

    /// Number of currently registered connections.
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Queue a frame onto one recipient's writer channel.
    ///
    /// Fails only when the receiver half is gone, which means that
    /// connection is closing.
    fn send_frame(
        sender: &FrameSender,
        recipient: &ConnectionId,
        frame: Frame,
    ) -> Result<(), RelayError> {
        sender.send(frame).map_err(|_| RelayError::SendFailed {
            recipient: recipient.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_deregister() {
        let registry = Registry::new();
        let (tx, _rx) = mpsc::unbounded_channel();

        let id = registry.register("127.0.0.1:40001", tx);
        assert_eq!(registry.connection_count(), 1);

        registry.deregister(&id);
        assert_eq!(registry.connection_count(), 0);

        // Double removal is a no-op, not an error
        registry.deregister(&id);
        assert_eq!(registry.connection_count(), 0);
    }

    #[test]
    fn test_broadcast_excludes_sender() {
        let registry = Registry::new();

        let (tx_a, mut rx_a) = mpsc::unbounded_channel();
        let (tx_b, mut rx_b) = mpsc::unbounded_channel();
        let (tx_c, mut rx_c) = mpsc::unbounded_channel();

        let a = registry.register("127.0.0.1:40001", tx_a);
        let _b = registry.register("127.0.0.1:40002", tx_b);
        let _c = registry.register("127.0.0.1:40003", tx_c);

        let frame = Frame::Text("offer-sdp-blob".to_string());
        let delivered = registry.broadcast(&a, &frame);
        assert_eq!(delivered, 2);

        // The sender receives nothing
        assert!(rx_a.try_recv().is_err());

        // Both others receive exactly one copy, byte-for-byte
        assert_eq!(rx_b.try_recv().unwrap(), frame);
        assert!(rx_b.try_recv().is_err());
        assert_eq!(rx_c.try_recv().unwrap(), frame);
        assert!(rx_c.try_recv().is_err());
    }

    #[test]
    fn test_send_failure_is_isolated() {
        let registry = Registry::new();

        let (tx_a, _rx_a) = mpsc::unbounded_channel();
        let (tx_b, rx_b) = mpsc::unbounded_channel();
        let (tx_c, mut rx_c) = mpsc::unbounded_channel();

        let a = registry.register("127.0.0.1:40001", tx_a);
        let _b = registry.register("127.0.0.2:40002", tx_b);
        let _c = registry.register("127.0.0.3:40003", tx_c);

        // B is already closing: its receiver is gone
        drop(rx_b);

        let frame = Frame::Text("ice-candidate-1".to_string());
        let delivered = registry.broadcast(&a, &frame);

        // C still receives, and the call did not fail
        assert_eq!(delivered, 1);
        assert_eq!(rx_c.try_recv().unwrap(), frame);
    }

    #[test]
    fn test_deregistered_connection_receives_nothing() {
        let registry = Registry::new();

        let (tx_a, _rx_a) = mpsc::unbounded_channel();
        let (tx_b, mut rx_b) = mpsc::unbounded_channel();

        let a = registry.register("127.0.0.1:40001", tx_a);
        let b = registry.register("127.0.0.1:40002", tx_b);

        registry.deregister(&b);
        assert_eq!(registry.connection_count(), 1);

        registry.broadcast(&a, &Frame::Text("late".to_string()));
        assert!(rx_b.try_recv().is_err());
    }

    #[test]
    fn test_binary_frames_relay_verbatim() {
        let registry = Registry::new();

        let (tx_a, _rx_a) = mpsc::unbounded_channel();
        let (tx_b, mut rx_b) = mpsc::unbounded_channel();

        let a = registry.register("127.0.0.1:40001", tx_a);
        let _b = registry.register("127.0.0.1:40002", tx_b);

        let payload = vec![0x00, 0xff, 0x7f, 0x80];
        registry.broadcast(&a, &Frame::Binary(payload.clone()));

        assert_eq!(rx_b.try_recv().unwrap(), Frame::Binary(payload));
    }
}
