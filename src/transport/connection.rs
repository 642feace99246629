//! The long-lived broker connection.
//!
//! One [`Connection`] is created at startup and handed to whatever needs the
//! bus. The underlying client reconnects on its own according to the
//! [`ReconnectPolicy`]; while it is down every operation fails fast with
//! [`TransportError::Unavailable`] instead of buffering.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_nats::connection::State;
use async_nats::{Client, ConnectOptions, Event};
use tracing::{error, info, warn};

use super::config::{ReconnectPolicy, TransportConfig};
use super::context::StreamContext;
use super::error::TransportError;

/// A shared, reconnecting broker session.
#[derive(Clone)]
pub struct Connection {
    client: Client,
    address: String,
    disconnects: Arc<AtomicUsize>,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("address", &self.address)
            .field("state", &self.client.connection_state())
            .finish()
    }
}

impl Connection {
    /// Connects to the broker.
    ///
    /// Fails if the first connection attempt fails; the reconnect policy only
    /// covers drops after that.
    pub async fn connect(config: &TransportConfig) -> Result<Self, TransportError> {
        let connection = Self::connect_with(config, |options| options).await?;
        info!(
            address = %connection.address,
            reconnect_interval_secs = config.reconnect.interval.as_secs(),
            max_reconnects = config.reconnect.max_attempts,
            "Connected to broker"
        );
        Ok(connection)
    }

    /// Returns a client that is still establishing its first session, so
    /// every operation sees the not-yet-connected state.
    #[cfg(test)]
    pub(crate) async fn connect_in_background(
        config: &TransportConfig,
    ) -> Result<Self, TransportError> {
        Self::connect_with(config, ConnectOptions::retry_on_initial_connect).await
    }

    async fn connect_with<F>(config: &TransportConfig, tweak: F) -> Result<Self, TransportError>
    where
        F: FnOnce(ConnectOptions) -> ConnectOptions,
    {
        let address = config.server_address.clone();
        let disconnects = Arc::new(AtomicUsize::new(0));

        let options = tweak(connect_options(
            config.reconnect,
            Arc::clone(&disconnects),
            address.clone(),
        ));

        let client = options
            .connect(address.as_str())
            .await
            .map_err(|e| TransportError::Connection {
                address: address.clone(),
                cause: e.to_string(),
            })?;

        Ok(Connection {
            client,
            address,
            disconnects,
        })
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn is_connected(&self) -> bool {
        matches!(self.client.connection_state(), State::Connected)
    }

    /// Number of times the session has dropped since connecting.
    pub fn disconnect_count(&self) -> usize {
        self.disconnects.load(Ordering::Relaxed)
    }

    /// Fails with [`TransportError::Unavailable`] unless the session is up.
    pub fn ensure_connected(&self) -> Result<(), TransportError> {
        check_state(&self.client.connection_state())
    }

    /// Opens the durable publish/subscribe context on this connection.
    pub fn streaming_context(&self) -> StreamContext {
        StreamContext::new(self.clone())
    }

    pub(crate) fn client(&self) -> &Client {
        &self.client
    }

    /// Drains the session: pending publishes are flushed, subscriptions are
    /// closed and the client shuts down. Every clone of this connection,
    /// including the ones held by [`StreamContext`]s, is closed with it.
    pub async fn close(self) -> Result<(), TransportError> {
        if self.is_connected() {
            self.client
                .drain()
                .await
                .map_err(|e| TransportError::Unavailable(e.to_string()))?;
        } else {
            warn!(address = %self.address, "Closing broker connection that is not up");
        }
        info!(address = %self.address, "Broker connection closed");
        Ok(())
    }
}

fn connect_options(
    policy: ReconnectPolicy,
    disconnects: Arc<AtomicUsize>,
    address: String,
) -> ConnectOptions {
    ConnectOptions::new()
        .max_reconnects(policy.max_attempts)
        .reconnect_delay_callback(move |attempt| policy.delay_for_attempt(attempt))
        .event_callback(move |event| {
            let disconnects = Arc::clone(&disconnects);
            let address = address.clone();
            async move {
                match event {
                    Event::Connected => info!(address = %address, "Broker connection restored"),
                    Event::Disconnected => {
                        let count = disconnects.fetch_add(1, Ordering::Relaxed) + 1;
                        warn!(address = %address, disconnects = count, "Broker connection lost");
                    }
                    Event::ServerError(e) => error!(address = %address, error = ?e, "Broker error"),
                    Event::ClientError(e) => {
                        error!(address = %address, error = ?e, "Broker client error")
                    }
                    other => info!(address = %address, event = ?other, "Broker event"),
                }
            }
        })
}

/// Maps a client state to the fail-fast rule.
pub(crate) fn check_state(state: &State) -> Result<(), TransportError> {
    if matches!(state, State::Connected) {
        return Ok(());
    }
    Err(TransportError::Unavailable(format!(
        "broker connection is {state:?}"
    )))
}
