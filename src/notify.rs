//! Announces reconciled pull requests on the bus.
//!
//! Runs only after the store has committed. A failed publish leaves the store
//! write in place; the caller sees the error and the record goes out on the
//! next delivery for the same pull request.

use std::sync::Arc;

use tracing::{error, info};

use crate::transport::topics::WEBHOOK_EVENT;
use crate::transport::{EventPublisher, OutboundMessage, PublishReceipt, TransportError};
use crate::types::PullRequestState;

/// Publishes [`PullRequestState`] records as JSON.
pub struct Notifier<P> {
    publisher: Arc<P>,
    topic: &'static str,
}

impl<P> Clone for Notifier<P> {
    fn clone(&self) -> Self {
        Notifier {
            publisher: Arc::clone(&self.publisher),
            topic: self.topic,
        }
    }
}

impl<P: EventPublisher> Notifier<P> {
    /// Publishes to `ORCHESTRATOR.WEBHOOK_EVENT`.
    pub fn new(publisher: Arc<P>) -> Self {
        Self::with_topic(publisher, WEBHOOK_EVENT.subject)
    }

    pub fn with_topic(publisher: Arc<P>, topic: &'static str) -> Self {
        Notifier { publisher, topic }
    }

    pub fn topic(&self) -> &'static str {
        self.topic
    }

    /// Publishes `state`, keyed for dedupe by [`PullRequestState::version_id`].
    pub async fn notify(&self, state: &PullRequestState) -> Result<PublishReceipt, TransportError> {
        let message = OutboundMessage::json(state)?.with_dedupe_id(state.version_id());

        match self.publisher.publish(self.topic, message).await {
            Ok(receipt) => {
                info!(
                    topic = self.topic,
                    key = %state.key(),
                    record_id = %state.id,
                    sequence = receipt.sequence,
                    duplicate = receipt.duplicate,
                    "Published pull request"
                );
                Ok(receipt)
            }
            Err(e) => {
                error!(topic = self.topic, key = %state.key(), error = %e, "Failed to publish pull request");
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{RecordingPublisher, snapshot};
    use crate::reconcile::replace_snapshot;
    use crate::types::{NewPullRequest, PrRecordId};
    use chrono::{Duration, TimeZone, Utc};

    fn state() -> PullRequestState {
        NewPullRequest {
            snapshot: snapshot("42", "opened", true),
            created_on: Utc.with_ymd_and_hms(2024, 1, 15, 10, 0, 0).unwrap(),
        }
        .into_state(PrRecordId(1))
    }

    #[tokio::test]
    async fn publishes_json_record_with_version_dedupe_id() {
        let publisher = Arc::new(RecordingPublisher::new());
        let notifier = Notifier::new(Arc::clone(&publisher));

        let receipt = notifier.notify(&state()).await.unwrap();
        assert_eq!(receipt.sequence, 1);

        let published = publisher.published();
        assert_eq!(published.len(), 1);
        let (topic, message) = &published[0];
        assert_eq!(topic, "ORCHESTRATOR.WEBHOOK_EVENT");
        assert_eq!(
            message.dedupe_id.as_deref(),
            Some("github:42:2024-01-15T10:00:00.000000000Z")
        );

        let body: PullRequestState = serde_json::from_slice(&message.payload).unwrap();
        assert_eq!(body, state());
    }

    #[tokio::test]
    async fn republishing_same_version_reuses_dedupe_id() {
        let publisher = Arc::new(RecordingPublisher::new());
        let notifier = Notifier::new(Arc::clone(&publisher));

        notifier.notify(&state()).await.unwrap();
        let second = notifier.notify(&state()).await.unwrap();

        assert!(second.duplicate);
        assert_eq!(publisher.stored_count(), 1);
        let published = publisher.published();
        assert_eq!(published[0].1.dedupe_id, published[1].1.dedupe_id);
    }

    #[tokio::test]
    async fn update_written_under_skewed_clock_is_not_dropped_as_duplicate() {
        let publisher = Arc::new(RecordingPublisher::new());
        let notifier = Notifier::new(Arc::clone(&publisher));

        let opened = state();
        let closed = replace_snapshot(
            &opened,
            snapshot("42", "closed", false),
            opened.created_on - Duration::seconds(1),
        );

        notifier.notify(&opened).await.unwrap();
        let receipt = notifier.notify(&closed).await.unwrap();

        assert!(!receipt.duplicate);
        assert_eq!(publisher.stored_count(), 2);
    }

    #[tokio::test]
    async fn transport_failure_is_returned() {
        let publisher = Arc::new(RecordingPublisher::new());
        publisher.go_offline();
        let notifier = Notifier::new(Arc::clone(&publisher));

        let err = notifier.notify(&state()).await.unwrap_err();
        assert!(matches!(err, TransportError::Unavailable(_)));
        assert!(publisher.published().is_empty());
    }
}
