//! The ingestion pipeline: archive, extract, reconcile, notify.
//!
//! Every delivery runs through the stages in order on the caller's task. A
//! stage that fails stops the pipeline and nothing after it runs:
//!
//! | Failing stage | Raw archive | PR record | Bus message |
//! |---------------|-------------|-----------|-------------|
//! | archive | no | no | no |
//! | extract | yes | no | no |
//! | reconcile | yes | no | no |
//! | notify | yes | yes | no |
//!
//! There is no retry here. The provider's own redelivery is the retry, and
//! is safe: the archive takes a new row, reconciliation upserts by key and
//! the bus message carries a dedupe id.

use std::sync::Arc;

use thiserror::Error;
use tracing::{info, instrument, warn};

use super::extract::{ExtractionError, extract};
use crate::archive::Archiver;
use crate::notify::Notifier;
use crate::reconcile::Reconciler;
use crate::store::{PrStore, StoreError};
use crate::transport::{EventPublisher, PublishReceipt, TransportError};
use crate::types::{ArchiveRecordId, GitHost, PullRequestState};

/// A pipeline failure, tagged with the stage that failed.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("archiving failed: {0}")]
    Archive(#[source] StoreError),

    #[error("extraction failed: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("reconciliation failed: {0}")]
    Reconcile(#[source] StoreError),

    #[error("notification failed: {0}")]
    Notify(#[from] TransportError),
}

impl PipelineError {
    /// Returns true if redelivering the same payload later could succeed.
    ///
    /// Extraction failures depend only on the payload and never are.
    pub fn is_transient(&self) -> bool {
        match self {
            PipelineError::Archive(_) | PipelineError::Reconcile(_) => true,
            PipelineError::Extraction(_) => false,
            PipelineError::Notify(e) => e.is_transient(),
        }
    }

    /// Whether the pull request record was written before the failure.
    pub fn record_committed(&self) -> bool {
        matches!(self, PipelineError::Notify(_))
    }
}

/// What a successful run produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Processed {
    pub archive_id: ArchiveRecordId,
    pub record: PullRequestState,
    pub receipt: PublishReceipt,
}

impl Processed {
    /// True if this delivery created the record rather than updating it.
    pub fn inserted(&self) -> bool {
        self.record.updated_on.is_none()
    }
}

/// Processes webhook deliveries from one provider.
pub struct WebhookPipeline<S, P> {
    host: GitHost,
    archiver: Archiver<S>,
    reconciler: Reconciler<S>,
    notifier: Notifier<P>,
}

impl<S, P> Clone for WebhookPipeline<S, P> {
    fn clone(&self) -> Self {
        WebhookPipeline {
            host: self.host,
            archiver: self.archiver.clone(),
            reconciler: self.reconciler.clone(),
            notifier: self.notifier.clone(),
        }
    }
}

impl<S, P> WebhookPipeline<S, P>
where
    S: PrStore,
    P: EventPublisher,
{
    pub fn new(host: GitHost, store: Arc<S>, publisher: Arc<P>) -> Self {
        WebhookPipeline {
            host,
            archiver: Archiver::new(Arc::clone(&store)),
            reconciler: Reconciler::new(store),
            notifier: Notifier::new(publisher),
        }
    }

    pub fn host(&self) -> GitHost {
        self.host
    }

    /// Runs one delivery through every stage.
    #[instrument(skip_all, fields(host = %self.host, bytes = payload.len()))]
    pub async fn handle_webhook_event(&self, payload: &str) -> Result<Processed, PipelineError> {
        let archive_id = self
            .archiver
            .archive(self.host, payload)
            .await
            .map_err(PipelineError::Archive)?;

        let snapshot = extract(self.host, payload).inspect_err(|e| {
            warn!(archive_id = %archive_id, error = %e, "Payload is not a pull request event");
        })?;

        let record = self
            .reconciler
            .reconcile(snapshot)
            .await
            .map_err(PipelineError::Reconcile)?;

        let receipt = self.notifier.notify(&record).await?;

        info!(
            archive_id = %archive_id,
            key = %record.key(),
            record_id = %record.id,
            action = %record.snapshot.action,
            is_open = record.snapshot.is_open,
            "Webhook processed"
        );

        Ok(Processed {
            archive_id,
            record,
            receipt,
        })
    }
}
