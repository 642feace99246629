//! Crash-safe store backed by two append-only record logs.
//!
//! Raw deliveries go to `raw_events.log`; every insert or update of a pull
//! request appends the full record to `pull_requests.log`. On open, the PR log
//! is replayed into an in-memory index, so reads never touch the disk.
//!
//! Writes hold the store lock for the duration of the append and fsync. That
//! work runs on tokio's blocking pool so a slow disk never stalls a runtime
//! worker; reads are served from the index without leaving the caller's task.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::index::PrIndex;
use super::{PrStore, Result, StoreError};
use crate::persistence::{RecordLog, ensure_dir, fsync_dir};
use crate::types::{
    ArchiveRecordId, NewPullRequest, PrKey, PrRecordId, PullRequestState, RawWebhookEvent,
};

const RAW_LOG_FILE: &str = "raw_events.log";
const PR_LOG_FILE: &str = "pull_requests.log";

/// One line of the pull request log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum PrLogRecord {
    Inserted(PullRequestState),
    Updated(PullRequestState),
}

impl PrLogRecord {
    fn into_state(self) -> PullRequestState {
        match self {
            PrLogRecord::Inserted(state) | PrLogRecord::Updated(state) => state,
        }
    }
}

/// A [`PrStore`] persisted under a state directory.
pub struct FileStore {
    state_dir: PathBuf,
    inner: Arc<Mutex<FileInner>>,
}

struct FileInner {
    raw_log: RecordLog<RawWebhookEvent>,
    pr_log: RecordLog<PrLogRecord>,
    prs: PrIndex,
}

impl FileStore {
    /// Opens (or creates) the store under `state_dir`, replaying both logs.
    pub fn open(state_dir: impl AsRef<Path>) -> Result<Self> {
        let state_dir = state_dir.as_ref().to_path_buf();
        ensure_dir(&state_dir)?;

        let (raw_log, raw_entries) =
            RecordLog::<RawWebhookEvent>::open(state_dir.join(RAW_LOG_FILE))?;
        let (pr_log, pr_entries) = RecordLog::<PrLogRecord>::open(state_dir.join(PR_LOG_FILE))?;
        // The logs may have just been created.
        fsync_dir(&state_dir)?;

        let mut prs = PrIndex::new();
        for entry in pr_entries {
            prs.apply(entry.record.into_state());
        }

        info!(
            state_dir = %state_dir.display(),
            raw_events = raw_entries.len(),
            pull_requests = prs.len(),
            "File store opened"
        );

        Ok(FileStore {
            state_dir,
            inner: Arc::new(Mutex::new(FileInner {
                raw_log,
                pr_log,
                prs,
            })),
        })
    }

    pub fn state_dir(&self) -> &Path {
        &self.state_dir
    }

    fn lock(&self) -> Result<MutexGuard<'_, FileInner>> {
        lock_inner(&self.inner)
    }

    /// Runs a write against the logs on the blocking pool.
    async fn write<R, F>(&self, op: F) -> Result<R>
    where
        R: Send + 'static,
        F: FnOnce(&mut FileInner) -> Result<R> + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || op(&mut *lock_inner(&inner)?))
            .await
            .map_err(|e| StoreError::Unavailable(format!("store write task failed: {e}")))?
    }

    pub fn pr_count(&self) -> usize {
        self.lock().map(|inner| inner.prs.len()).unwrap_or(0)
    }

    /// Number of deliveries archived so far.
    pub fn raw_count(&self) -> u64 {
        self.lock().map(|inner| inner.raw_log.next_seq()).unwrap_or(0)
    }
}

impl PrStore for FileStore {
    async fn get_pr(&self, key: &PrKey) -> Result<Option<PullRequestState>> {
        Ok(self.lock()?.prs.get(key).cloned())
    }

    async fn insert_pr(&self, record: &NewPullRequest) -> Result<PrRecordId> {
        let record = record.clone();
        self.write(move |inner| {
            let state = inner.prs.prepare_insert(&record)?;
            let entry = inner.pr_log.append(PrLogRecord::Inserted(state))?;
            let state = entry.record.into_state();
            let id = state.id;
            debug!(record_id = %id, key = %state.key(), seq = entry.seq, "Inserted pull request");
            inner.prs.apply(state);
            Ok(id)
        })
        .await
    }

    async fn update_pr(&self, state: &PullRequestState) -> Result<()> {
        let state = state.clone();
        self.write(move |inner| {
            inner.prs.check_update(&state)?;
            let entry = inner.pr_log.append(PrLogRecord::Updated(state))?;
            let state = entry.record.into_state();
            debug!(record_id = %state.id, key = %state.key(), seq = entry.seq, "Updated pull request");
            inner.prs.apply(state);
            Ok(())
        })
        .await
    }

    async fn insert_raw(&self, event: &RawWebhookEvent) -> Result<ArchiveRecordId> {
        let event = event.clone();
        self.write(move |inner| {
            let entry = inner.raw_log.append(event)?;
            // Log sequence numbers start at 0; record ids start at 1.
            Ok(ArchiveRecordId(entry.seq + 1))
        })
        .await
    }
}

fn lock_inner(inner: &Mutex<FileInner>) -> Result<MutexGuard<'_, FileInner>> {
    inner
        .lock()
        .map_err(|_| StoreError::Unavailable("file store lock poisoned".to_string()))
}
