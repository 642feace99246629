//! Raw webhook deliveries as archived before interpretation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::GitHost;

/// One inbound webhook delivery, exactly as received.
///
/// The payload is stored as text and never inspected by the archive path, so a
/// delivery that later fails extraction is still recoverable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawWebhookEvent {
    pub host: GitHost,
    pub payload: String,
    pub received_at: DateTime<Utc>,
}

impl RawWebhookEvent {
    /// Records a delivery received now.
    pub fn received_now(host: GitHost, payload: impl Into<String>) -> Self {
        RawWebhookEvent {
            host,
            payload: payload.into(),
            received_at: Utc::now(),
        }
    }
}
