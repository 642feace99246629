//! Broker connection settings.

use std::env;
use std::time::Duration;

use crate::config::{ConfigError, read_var};

pub const SERVER_ADDRESS_VAR: &str = "NATS_SERVER_HOST";

/// In-cluster address of the broker.
pub const DEFAULT_SERVER_ADDRESS: &str = "nats://devtron-nats.devtroncd:4222";

const SCHEMES: [&str; 4] = ["nats", "tls", "ws", "wss"];

/// How the connection behaves after it drops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Fixed wait between reconnect attempts.
    pub interval: Duration,

    /// Attempts before the connection is given up for good. The caller must
    /// then connect again.
    pub max_attempts: usize,
}

impl ReconnectPolicy {
    /// 100 attempts, 10 s apart: a little under 17 minutes of outage.
    pub const DEFAULT: Self = Self {
        interval: Duration::from_secs(10),
        max_attempts: 100,
    };

    pub fn new(interval: Duration, max_attempts: usize) -> Self {
        Self {
            interval,
            max_attempts,
        }
    }

    /// Delay before the given reconnect attempt. Always the fixed interval.
    pub fn delay_for_attempt(&self, _attempt: usize) -> Duration {
        self.interval
    }

    /// Longest outage survived before giving up.
    pub fn total_budget(&self) -> Duration {
        self.interval * self.max_attempts as u32
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Settings for [`Connection::connect`](super::Connection::connect).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportConfig {
    pub server_address: String,
    pub reconnect: ReconnectPolicy,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self::new(DEFAULT_SERVER_ADDRESS)
    }
}

impl TransportConfig {
    pub fn new(server_address: impl Into<String>) -> Self {
        TransportConfig {
            server_address: server_address.into(),
            reconnect: ReconnectPolicy::DEFAULT,
        }
    }

    /// Load configuration from environment variables.
    ///
    /// Optional:
    /// - `NATS_SERVER_HOST`: broker address (default: [`DEFAULT_SERVER_ADDRESS`])
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(&|var: &str| env::var(var).ok())
    }

    pub fn from_lookup<F>(lookup: &F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let address = read_var(lookup, SERVER_ADDRESS_VAR)
            .unwrap_or_else(|| DEFAULT_SERVER_ADDRESS.to_string());
        validate_address(&address)?;
        Ok(Self::new(address))
    }
}

fn validate_address(address: &str) -> Result<(), ConfigError> {
    let invalid = |reason: String| ConfigError::Invalid {
        var: SERVER_ADDRESS_VAR.to_string(),
        reason,
    };

    if address.chars().any(char::is_whitespace) {
        return Err(invalid(format!("{address:?} contains whitespace")));
    }

    let host = match address.split_once("://") {
        Some((scheme, rest)) => {
            if !SCHEMES.contains(&scheme) {
                return Err(invalid(format!("unsupported scheme {scheme:?}")));
            }
            rest
        }
        None => address,
    };

    if host.is_empty() || host.starts_with(':') {
        return Err(invalid(format!("{address:?} has no host")));
    }
    Ok(())
}
