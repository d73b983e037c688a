//! # Beacon Relay
//!
//! The connection registry and broadcast-relay core of the Beacon signaling
//! server.
//!
//! Beacon relays real-time signaling messages (WebRTC offer/answer/ICE
//! exchange) between clients: every message received from one connection is
//! forwarded verbatim to all other currently-connected clients. The relay
//! never interprets payloads beyond a narrow liveness sub-protocol
//! (`{"type":"ping"}` answered with `{"type":"pong"}` to the sender only)
//! and never persists anything.
//!
//! ## Design Principles
//!
//! - **No transport**: this crate knows channels, not sockets. A connection
//!   is represented by the sender half of its outbound frame channel; the
//!   server crate owns the WebSocket itself.
//! - **Isolated failures**: a failed send to one recipient is logged and
//!   skipped, never surfaced to the sending client and never allowed to
//!   abort delivery to the remaining recipients.
//! - **Scoped membership**: a [`Session`] registers its connection on open
//!   and deregisters it when dropped, so membership release is guaranteed
//!   on every exit path.
//! - **Testable**: the registry is an explicitly owned value, so any number
//!   of independent relay instances can coexist in one process.
//!
//! ## Core Concepts
//!
//! ### Registry
//!
//! The [`Registry`] is the in-memory membership set of open connections.
//! [`Registry::broadcast`] snapshots the membership before iterating, so a
//! connection added or removed mid-broadcast is deterministically included
//! or excluded.
//!
//! ### Session
//!
//! One [`Session`] per accepted connection. It classifies inbound text via
//! [`classify`]: a liveness check produces a direct [`ServerEnvelope::Pong`]
//! reply, everything else is relayed untouched. How the connection ended is
//! reported with [`SessionEnd`]; only error endings are logged as errors.
//!
//! ### Frames
//!
//! A [`Frame`] is the opaque unit of relay: text, binary, or a transport
//! keepalive probe sharing the connection's writer channel.

pub mod envelope;
pub mod error;
pub mod registry;
pub mod session;

// Re-export main types at crate root
pub use envelope::{classify, Disposition, Frame, ServerEnvelope};
pub use error::{RelayError, SessionEnd};
pub use registry::{Connection, ConnectionId, FrameSender, Registry};
pub use session::Session;
