//! Configuration management for the server.
//!
//! All values are resolved from the environment once at startup and never
//! re-read afterwards.

use std::env;
use std::time::Duration;

const DEFAULT_PORT: u16 = 8765;
const DEFAULT_MAX_MESSAGE_BYTES: usize = 10 * 1024 * 1024;
const DEFAULT_KEEPALIVE_INTERVAL_SECS: u64 = 30;
const DEFAULT_KEEPALIVE_TIMEOUT_SECS: u64 = 10;
const DEFAULT_BACKLOG: u32 = 1024;

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server host address
    pub host: String,
    /// Server port, first non-empty of SIGNALING_PORT and PORT
    pub port: u16,
    /// Upper bound on a single inbound WebSocket message
    pub max_message_bytes: usize,
    /// How often idle connections are probed
    pub keepalive_interval: Duration,
    /// How long a probe may stay unacknowledged before the connection is
    /// treated as closed
    pub keepalive_timeout: Duration,
    /// Pending-connection queue depth for the listener
    pub backlog: u32,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());

        let port = resolve_port(non_empty_var("SIGNALING_PORT"), non_empty_var("PORT"))?;

        let max_message_bytes = parse_var("MAX_MESSAGE_SIZE", DEFAULT_MAX_MESSAGE_BYTES)?;
        let keepalive_interval = Duration::from_secs(parse_var(
            "KEEPALIVE_INTERVAL_SECS",
            DEFAULT_KEEPALIVE_INTERVAL_SECS,
        )?);
        let keepalive_timeout = Duration::from_secs(parse_var(
            "KEEPALIVE_TIMEOUT_SECS",
            DEFAULT_KEEPALIVE_TIMEOUT_SECS,
        )?);
        let backlog = parse_var("LISTEN_BACKLOG", DEFAULT_BACKLOG)?;

        Ok(Self {
            host,
            port,
            max_message_bytes,
            keepalive_interval,
            keepalive_timeout,
            backlog,
        })
    }
}

/// The value of `key` when it is set and non-empty.
fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.is_empty())
}

/// Resolve the listen port: the dedicated signaling variable wins over the
/// generic one, and both fall back to the default.
fn resolve_port(signaling: Option<String>, generic: Option<String>) -> Result<u16, ConfigError> {
    match signaling.or(generic) {
        Some(raw) => raw
            .parse()
            .map_err(|_| ConfigError::InvalidPort(raw.clone())),
        None => Ok(DEFAULT_PORT),
    }
}

fn parse_var<T: std::str::FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match non_empty_var(key) {
        Some(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue {
            key,
            value: raw.clone(),
        }),
        None => Ok(default),
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid port value: {0}")]
    InvalidPort(String),

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signaling_port_wins_over_generic_port() {
        let port = resolve_port(Some("9001".into()), Some("3000".into())).unwrap();
        assert_eq!(port, 9001);
    }

    #[test]
    fn generic_port_is_the_fallback() {
        let port = resolve_port(None, Some("3000".into())).unwrap();
        assert_eq!(port, 3000);
    }

    #[test]
    fn default_port_when_nothing_is_set() {
        assert_eq!(resolve_port(None, None).unwrap(), DEFAULT_PORT);
    }

    #[test]
    fn invalid_port_is_a_startup_fault() {
        let err = resolve_port(Some("not-a-port".into()), None).unwrap_err();
        assert_eq!(err.to_string(), "Invalid port value: not-a-port");
    }
}
