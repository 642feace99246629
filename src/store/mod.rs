//! Record store capability consumed by the pipeline.
//!
//! The pipeline only needs four operations: read a pull request by its
//! external key, insert a new one, overwrite an existing one, and archive a
//! raw delivery. [`PrStore`] names exactly those, so the backing store can be
//! swapped without touching the archiver or reconciler.
//!
//! Two implementations ship with the crate:
//! - [`MemoryStore`]: process-local, for tests and local runs
//! - [`FileStore`]: crash-safe JSON Lines logs under a state directory

mod file;
mod index;
mod memory;

use std::future::Future;
use std::io;

use thiserror::Error;

use crate::persistence::LogError;
use crate::types::{
    ArchiveRecordId, NewPullRequest, PrKey, PrRecordId, PullRequestState, RawWebhookEvent,
};

pub use file::FileStore;
pub use memory::MemoryStore;

/// Errors returned by store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Writing to or replaying a record log failed.
    #[error("record log error: {0}")]
    Log(#[from] LogError),

    /// Filesystem error outside the logs (e.g. creating the state directory).
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// An insert targeted a key that already has a record.
    #[error("pull request {0} already exists")]
    DuplicateKey(PrKey),

    /// An update targeted a record id the store does not know.
    #[error("pull request record {0} not found")]
    NotFound(PrRecordId),

    /// An update tried to move a record to a different external key.
    #[error("record {id} belongs to {stored}, not {requested}")]
    KeyMismatch {
        id: PrRecordId,
        stored: PrKey,
        requested: PrKey,
    },

    /// The store cannot serve requests at all.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Persistent storage for raw deliveries and reconciled pull requests.
///
/// Implementations must be safe for concurrent independent operations. They
/// are not required to serialize read-modify-write sequences; the reconciler
/// does that per key.
pub trait PrStore: Send + Sync {
    /// Looks up the record for `key`, if one exists.
    fn get_pr(&self, key: &PrKey) -> impl Future<Output = Result<Option<PullRequestState>>> + Send;

    /// Inserts a new record and returns the id assigned to it.
    ///
    /// Fails with [`StoreError::DuplicateKey`] if `key` already has a record.
    fn insert_pr(&self, record: &NewPullRequest) -> impl Future<Output = Result<PrRecordId>> + Send;

    /// Overwrites the record with `state.id`.
    fn update_pr(&self, state: &PullRequestState) -> impl Future<Output = Result<()>> + Send;

    /// Archives a raw delivery and returns its archive id.
    fn insert_raw(
        &self,
        event: &RawWebhookEvent,
    ) -> impl Future<Output = Result<ArchiveRecordId>> + Send;
}
