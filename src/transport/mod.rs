//! Durable message bus transport.
//!
//! A single [`Connection`] to a NATS server is opened at startup and shared.
//! [`Connection::streaming_context`] yields a [`StreamContext`] for durable,
//! replayable publish/subscribe on the topics in [`topics`].
//!
//! Delivery is at-least-once in both directions:
//! - a publish returns only after the broker has persisted the message, and
//!   carries an optional dedupe id so the broker can drop redeliveries inside
//!   its duplicate window
//! - a durable subscription redelivers anything not acknowledged, including
//!   across consumer restarts
//!
//! The pipeline only depends on [`EventPublisher`], so it can run against an
//! in-process double in tests.

mod config;
mod connection;
mod context;
mod error;
pub mod topics;

use std::future::Future;

use bytes::Bytes;
use serde::Serialize;

pub use config::{DEFAULT_SERVER_ADDRESS, ReconnectPolicy, SERVER_ADDRESS_VAR, TransportConfig};
pub use connection::Connection;
pub use context::{Delivery, DurableSubscription, StreamContext};
pub use error::TransportError;
pub use topics::StreamTopic;

/// A message ready to publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub payload: Bytes,
    /// Broker-side dedupe id. Two publishes with the same id inside the
    /// broker's duplicate window store one message.
    pub dedupe_id: Option<String>,
}

impl OutboundMessage {
    pub fn new(payload: impl Into<Bytes>) -> Self {
        OutboundMessage {
            payload: payload.into(),
            dedupe_id: None,
        }
    }

    /// Serializes `value` as the JSON payload.
    pub fn json<T: Serialize>(value: &T) -> Result<Self, TransportError> {
        Ok(Self::new(serde_json::to_vec(value)?))
    }

    pub fn with_dedupe_id(mut self, id: impl Into<String>) -> Self {
        self.dedupe_id = Some(id.into());
        self
    }
}

/// The broker's acknowledgement of a persisted message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishReceipt {
    pub stream: String,
    pub sequence: u64,
    /// The broker already held a message with the same dedupe id.
    pub duplicate: bool,
}

/// Publishing side of the bus.
pub trait EventPublisher: Send + Sync {
    /// Publishes `message` to `topic`, returning once the broker has
    /// persisted it.
    ///
    /// Fails with [`TransportError::Unavailable`] while disconnected; the
    /// message is not queued for later.
    fn publish(
        &self,
        topic: &str,
        message: OutboundMessage,
    ) -> impl Future<Output = Result<PublishReceipt, TransportError>> + Send;
}
