//! Signaling envelope definitions.
//!
//! All relayed payloads are opaque. The only structured messages the server
//! interprets are the liveness check (`{"type":"ping"}`) and the envelopes
//! it originates itself; everything else passes through byte-for-byte,
//! including payloads that are not valid JSON at all.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A payload travelling through the registry to a connection's writer task.
///
/// `Ping` carries the transport-level keepalive probe so it can share the
/// connection's single writer channel; the relay logic never produces or
/// inspects it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Binary(Vec<u8>),
    Ping(Vec<u8>),
}

/// Inbound messages the server recognizes.
///
/// Anything that fails to deserialize into this enum is relayed as-is; a
/// parse failure is not a session error.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClientEnvelope {
    /// Liveness check. The `time` value is echoed back verbatim.
    Ping {
        #[serde(default)]
        time: Option<Value>,
    },

    /// Structured message with any other `type`: relayed, never answered.
    #[serde(other)]
    Other,
}

/// Messages the server itself originates.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEnvelope {
    /// Liveness reply, sent to the pinging connection only.
    Pong { time: Value },

    /// Greeting sent once to each client right after registration.
    Welcome { message: String, timestamp: i64 },
}

impl ServerEnvelope {
    /// Create a pong echoing the incoming `time` value, defaulting to the
    /// current Unix-epoch milliseconds when the ping carried none.
    pub fn pong(time: Option<Value>) -> Self {
        let time = time.unwrap_or_else(|| Value::from(chrono::Utc::now().timestamp_millis()));
        ServerEnvelope::Pong { time }
    }

    /// Create the post-registration greeting.
    pub fn welcome(service: &str) -> Self {
        ServerEnvelope::Welcome {
            message: format!("Connected to {service}"),
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }
}

/// What to do with one inbound text payload.
#[derive(Debug)]
pub enum Disposition {
    /// Liveness check: answer the sender with this envelope and relay
    /// nothing.
    Reply(ServerEnvelope),
    /// Everything else: relay the payload verbatim to all other
    /// connections.
    Relay,
}

/// Classify an inbound text payload.
///
/// Only `{"type":"ping"}` is answered directly; other structured messages,
/// messages without a `type` field, and non-JSON payloads all relay.
pub fn classify(text: &str) -> Disposition {
    match serde_json::from_str::<ClientEnvelope>(text) {
        Ok(ClientEnvelope::Ping { time }) => Disposition::Reply(ServerEnvelope::pong(time)),
        // Unknown types and parse failures are both opaque payloads.
        Ok(ClientEnvelope::Other) | Err(_) => Disposition::Relay,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn ping_is_answered_with_echoed_time() {
        let disposition = classify(r#"{"type":"ping","time":42}"#);
        match disposition {
            Disposition::Reply(envelope) => {
                let text = serde_json::to_string(&envelope).unwrap();
                assert_eq!(text, r#"{"type":"pong","time":42}"#);
            }
            Disposition::Relay => panic!("ping must be answered, not relayed"),
        }
    }

    #[test]
    fn ping_without_time_gets_a_default() {
        match classify(r#"{"type":"ping"}"#) {
            Disposition::Reply(ServerEnvelope::Pong { time }) => {
                assert!(time.is_i64());
            }
            other => panic!("expected pong, got {other:?}"),
        }
    }

    #[test]
    fn other_types_are_relayed() {
        assert!(matches!(
            classify(r#"{"type":"offer","sdp":"v=0"}"#),
            Disposition::Relay
        ));
        assert!(matches!(
            classify(r#"{"type":"pong","time":1}"#),
            Disposition::Relay
        ));
    }

    #[test]
    fn unstructured_payloads_are_relayed() {
        // Not JSON at all
        assert!(matches!(classify("hello"), Disposition::Relay));
        // JSON without a type field
        assert!(matches!(classify(r#"{"sdp":"v=0"}"#), Disposition::Relay));
        // A non-string type tag
        assert!(matches!(classify(r#"{"type":42}"#), Disposition::Relay));
        // Case matters: only lowercase "ping" is the liveness check
        assert!(matches!(classify(r#"{"type":"PING"}"#), Disposition::Relay));
    }

    #[test]
    fn ping_time_echoes_arbitrary_json() {
        match classify(r#"{"type":"ping","time":"not-a-number"}"#) {
            Disposition::Reply(ServerEnvelope::Pong { time }) => {
                assert_eq!(time, json!("not-a-number"));
            }
            other => panic!("expected pong, got {other:?}"),
        }
    }

    #[test]
    fn welcome_serialization() {
        let envelope = ServerEnvelope::welcome("Beacon Signaling Server");
        let text = serde_json::to_string(&envelope).unwrap();
        assert!(text.contains(r#""type":"welcome""#));
        assert!(text.contains("Connected to Beacon Signaling Server"));
        assert!(text.contains(r#""timestamp":"#));
    }
}
