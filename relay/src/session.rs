//! Per-connection relay session.
//!
//! A `Session` is one connection's registry membership held as a scoped
//! resource: opening the session registers the connection, dropping it
//! deregisters. Because release runs in `Drop`, it fires on every exit
//! path the transport can take, panics and task cancellation included.

use std::sync::Arc;

use crate::envelope::{classify, Disposition, Frame, ServerEnvelope};
use crate::error::SessionEnd;
use crate::registry::{ConnectionId, FrameSender, Registry};

/// The relay-side state of one open connection.
///
/// The session is open for exactly the lifetime of this value: the closing
/// transition is [`Session::finish`], and the deregistration that completes
/// it runs when the value drops.
pub struct Session {
    registry: Arc<Registry>,
    id: ConnectionId,
    remote: String,
}

impl Session {
    /// Register `remote` with the registry and open its session.
    ///
    /// Must be called before the transport accepts any message; from this
    /// point on the connection is included in every broadcast.
    pub fn open(registry: Arc<Registry>, remote: impl Into<String>, sender: FrameSender) -> Self {
        let remote = remote.into();
        let id = registry.register(remote.clone(), sender);

        Session {
            registry,
            id,
            remote,
        }
    }

    /// The registry-assigned connection ID.
    pub fn id(&self) -> &ConnectionId {
        &self.id
    }

    /// The transport-reported peer address.
    pub fn remote(&self) -> &str {
        &self.remote
    }

    /// Handle one inbound text payload.
    ///
    /// A liveness check returns the pong to send back to this connection
    /// alone and is never relayed; any other payload is relayed verbatim to
    /// all other connections and returns `None`.
    pub fn handle_text(&self, text: &str) -> Option<ServerEnvelope> {
        match classify(text) {
            Disposition::Reply(envelope) => Some(envelope),
            Disposition::Relay => {
                self.registry.broadcast(&self.id, &Frame::Text(text.to_owned()));
                None
            }
        }
    }

    /// Relay one inbound binary payload verbatim.
    pub fn handle_binary(&self, bytes: Vec<u8>) {
        self.registry.broadcast(&self.id, &Frame::Binary(bytes));
    }

    /// End the session, recording how the connection closed.
    ///
    /// Consumes the session; the `Drop` that follows deregisters the
    /// connection. Ordinary closure is an info-level lifecycle event, a
    /// transport fault is an error scoped to this session only.
    pub fn finish(self, end: SessionEnd) {
        match &end {
            SessionEnd::ClosedNormally => {
                tracing::info!(conn_id = %self.id, remote = %self.remote, "connection closed");
            }
            SessionEnd::ClosedWithError(reason) => {
                tracing::error!(
                    conn_id = %self.id,
                    remote = %self.remote,
                    %reason,
                    "session ended with error"
                );
            }
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.registry.deregister(&self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn open_session(registry: &Arc<Registry>) -> (Session, mpsc::UnboundedReceiver<Frame>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let session = Session::open(registry.clone(), "127.0.0.1:40001", tx);
        (session, rx)
    }

    #[test]
    fn test_open_registers_and_drop_deregisters() {
        let registry = Registry::new_shared();

        let (session, _rx) = open_session(&registry);
        assert_eq!(registry.connection_count(), 1);

        drop(session);
        assert_eq!(registry.connection_count(), 0);
    }

    #[test]
    fn test_finish_deregisters_exactly_once() {
        let registry = Registry::new_shared();

        let (session, _rx) = open_session(&registry);
        session.finish(SessionEnd::ClosedNormally);
        assert_eq!(registry.connection_count(), 0);
    }

    #[test]
    fn test_ping_answers_sender_without_relaying() {
        let registry = Registry::new_shared();

        let (session_a, mut rx_a) = open_session(&registry);
        let (_session_b, mut rx_b) = open_session(&registry);

        let reply = session_a.handle_text(r#"{"type":"ping","time":42}"#);

        let pong = serde_json::to_string(&reply.expect("ping must be answered")).unwrap();
        assert_eq!(pong, r#"{"type":"pong","time":42}"#);

        // Nothing was relayed and nothing was queued for the sender
        assert!(rx_a.try_recv().is_err());
        assert!(rx_b.try_recv().is_err());
    }

    #[test]
    fn test_opaque_payload_relays_to_others_only() {
        let registry = Registry::new_shared();

        let (session_a, mut rx_a) = open_session(&registry);
        let (_session_b, mut rx_b) = open_session(&registry);

        let reply = session_a.handle_text("hello");
        assert!(reply.is_none());

        assert!(rx_a.try_recv().is_err());
        assert_eq!(rx_b.try_recv().unwrap(), Frame::Text("hello".to_string()));
    }
}
