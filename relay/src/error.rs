//! Error and session-outcome types for the relay core.

use thiserror::Error;

use crate::registry::ConnectionId;

/// All possible errors from the relay core.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RelayError {
    /// Delivery to a single broadcast recipient failed because that
    /// connection is already closing. Isolated per recipient: the registry
    /// logs it and continues with the remaining recipients.
    #[error("send to {recipient} failed: connection is closing")]
    SendFailed { recipient: ConnectionId },
}

/// How a relay session ended.
///
/// Connection closure is an expected terminal condition, not an error;
/// only [`SessionEnd::ClosedWithError`] is logged as one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEnd {
    /// The peer closed the connection (graceful close frame or end of
    /// stream).
    ClosedNormally,
    /// The transport reported a fault mid-session.
    ClosedWithError(String),
}

impl SessionEnd {
    /// Whether this ending should be reported as an error.
    pub fn is_error(&self) -> bool {
        matches!(self, SessionEnd::ClosedWithError(_))
    }
}

impl std::fmt::Display for SessionEnd {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionEnd::ClosedNormally => write!(f, "closed"),
            SessionEnd::ClosedWithError(reason) => write!(f, "closed with error: {reason}"),
        }
    }
}
