//! Raw event archiving.
//!
//! Every delivery is written to the store verbatim before anything tries to
//! interpret it. The archive is the replay source if extraction or
//! reconciliation later turns out to be wrong, so a failure here stops the
//! pipeline.

use std::sync::Arc;

use tracing::{debug, error};

use crate::store::{PrStore, StoreError};
use crate::types::{ArchiveRecordId, GitHost, RawWebhookEvent};

/// Writes raw deliveries to the store.
pub struct Archiver<S> {
    store: Arc<S>,
}

impl<S> Clone for Archiver<S> {
    fn clone(&self) -> Self {
        Archiver {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: PrStore> Archiver<S> {
    pub fn new(store: Arc<S>) -> Self {
        Archiver { store }
    }

    /// Archives `payload` as received from `host`.
    ///
    /// The payload is never parsed here; any text is accepted.
    pub async fn archive(&self, host: GitHost, payload: &str) -> Result<ArchiveRecordId, StoreError> {
        let event = RawWebhookEvent::received_now(host, payload);
        match self.store.insert_raw(&event).await {
            Ok(id) => {
                debug!(host = %host, archive_id = %id, bytes = payload.len(), "Archived raw webhook");
                Ok(id)
            }
            Err(e) => {
                error!(host = %host, error = %e, "Failed to archive raw webhook");
                Err(e)
            }
        }
    }
}
