//! Transport error types.

use thiserror::Error;

/// Errors from the broker connection and the streaming context.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The initial connection could not be established.
    #[error("failed to connect to broker at {address}: {cause}")]
    Connection { address: String, cause: String },

    /// The connection is down (reconnecting or out of reconnect attempts).
    /// Nothing was sent.
    #[error("broker unavailable: {0}")]
    Unavailable(String),

    /// The broker did not accept a published message.
    #[error("failed to publish to {topic}: {cause}")]
    PublishFailed { topic: String, cause: String },

    /// A durable subscription could not be opened.
    #[error("failed to subscribe to {topic}: {cause}")]
    SubscribeFailed { topic: String, cause: String },

    /// A broker-side stream could not be created or looked up.
    #[error("failed to provision stream {stream}: {cause}")]
    StreamSetup { stream: String, cause: String },

    /// A delivery could not be acknowledged.
    #[error("failed to acknowledge delivery on {topic}: {cause}")]
    AckFailed { topic: String, cause: String },

    /// A payload could not be encoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl TransportError {
    /// Returns true if the same call could succeed later without any change on
    /// our side.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            TransportError::Connection { .. }
                | TransportError::Unavailable(_)
                | TransportError::PublishFailed { .. }
                | TransportError::SubscribeFailed { .. }
                | TransportError::AckFailed { .. }
        )
    }
}
