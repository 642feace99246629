//! Process configuration.
//!
//! Everything is read from the environment once at startup:
//!
//! | Variable | Default |
//! |----------|---------|
//! | `NATS_SERVER_HOST` | `nats://devtron-nats.devtroncd:4222` |
//! | `STATE_DIR` | `./state` |
//! | `LISTEN_ADDR` | `0.0.0.0:8080` |

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;

use crate::transport::TransportConfig;

pub const STATE_DIR_VAR: &str = "STATE_DIR";
pub const LISTEN_ADDR_VAR: &str = "LISTEN_ADDR";

pub const DEFAULT_STATE_DIR: &str = "./state";
pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8080";

/// Errors from loading configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A variable is set but its value is unusable.
    #[error("invalid value for {var}: {reason}")]
    Invalid { var: String, reason: String },
}

/// Reads a variable, treating unset and blank the same.
pub(crate) fn read_var<F>(lookup: &F, var: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(var)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Top-level service configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub transport: TransportConfig,
    /// Directory holding the record logs.
    pub state_dir: PathBuf,
    /// Address the HTTP server binds to.
    pub listen_addr: SocketAddr,
}

impl AppConfig {
    /// Loads configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| env::var(var).ok())
    }

    /// Loads configuration through `lookup` instead of the process
    /// environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let transport = TransportConfig::from_lookup(&lookup)?;

        let state_dir = read_var(&lookup, STATE_DIR_VAR)
            .unwrap_or_else(|| DEFAULT_STATE_DIR.to_string())
            .into();

        let listen_addr = read_var(&lookup, LISTEN_ADDR_VAR)
            .unwrap_or_else(|| DEFAULT_LISTEN_ADDR.to_string());
        let listen_addr = listen_addr.parse().map_err(|e| ConfigError::Invalid {
            var: LISTEN_ADDR_VAR.to_string(),
            reason: format!("{listen_addr:?}: {e}"),
        })?;

        Ok(AppConfig {
            transport,
            state_dir,
            listen_addr,
        })
    }

    pub fn builder() -> AppConfigBuilder {
        AppConfigBuilder::default()
    }
}

/// Builds an [`AppConfig`] starting from the defaults.
#[derive(Debug, Default)]
pub struct AppConfigBuilder {
    server_address: Option<String>,
    state_dir: Option<PathBuf>,
    listen_addr: Option<SocketAddr>,
}

impl AppConfigBuilder {
    pub fn server_address(mut self, address: impl Into<String>) -> Self {
        self.server_address = Some(address.into());
        self
    }

    pub fn state_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.state_dir = Some(dir.into());
        self
    }

    pub fn listen_addr(mut self, addr: SocketAddr) -> Self {
        self.listen_addr = Some(addr);
        self
    }

    pub fn build(self) -> AppConfig {
        let transport = match self.server_address {
            Some(address) => TransportConfig::new(address),
            None => TransportConfig::default(),
        };
        AppConfig {
            transport,
            state_dir: self
                .state_dir
                .unwrap_or_else(|| PathBuf::from(DEFAULT_STATE_DIR)),
            listen_addr: self
                .listen_addr
                .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 8080))),
        }
    }
}
