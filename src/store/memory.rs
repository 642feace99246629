//! Process-local store.
//!
//! Nothing survives a restart; useful for tests and for running the server
//! without a state directory.

use std::sync::{Mutex, MutexGuard};

use super::index::PrIndex;
use super::{PrStore, Result, StoreError};
use crate::types::{
    ArchiveRecordId, NewPullRequest, PrKey, PrRecordId, PullRequestState, RawWebhookEvent,
};

/// A [`PrStore`] held entirely in memory.
#[derive(Debug)]
pub struct MemoryStore {
    inner: Mutex<MemoryInner>,
}

#[derive(Debug)]
struct MemoryInner {
    prs: PrIndex,
    raw: Vec<RawWebhookEvent>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore {
            inner: Mutex::new(MemoryInner {
                prs: PrIndex::new(),
                raw: Vec::new(),
            }),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryInner>> {
        self.inner
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".to_string()))
    }

    /// Every archived delivery, in archive order.
    pub fn raw_events(&self) -> Vec<RawWebhookEvent> {
        self.lock().map(|inner| inner.raw.clone()).unwrap_or_default()
    }

    /// Every pull request record, ordered by id.
    pub fn pull_requests(&self) -> Vec<PullRequestState> {
        let mut prs: Vec<_> = self
            .lock()
            .map(|inner| inner.prs.records().cloned().collect())
            .unwrap_or_default();
        prs.sort_by_key(|pr| pr.id);
        prs
    }

    pub fn pr_count(&self) -> usize {
        self.lock().map(|inner| inner.prs.len()).unwrap_or(0)
    }
}

impl PrStore for MemoryStore {
    async fn get_pr(&self, key: &PrKey) -> Result<Option<PullRequestState>> {
        Ok(self.lock()?.prs.get(key).cloned())
    }

    async fn insert_pr(&self, record: &NewPullRequest) -> Result<PrRecordId> {
        let mut inner = self.lock()?;
        let state = inner.prs.prepare_insert(record)?;
        let id = state.id;
        inner.prs.apply(state);
        Ok(id)
    }

    async fn update_pr(&self, state: &PullRequestState) -> Result<()> {
        let mut inner = self.lock()?;
        inner.prs.check_update(state)?;
        inner.prs.apply(state.clone());
        Ok(())
    }

    async fn insert_raw(&self, event: &RawWebhookEvent) -> Result<ArchiveRecordId> {
        let mut inner = self.lock()?;
        inner.raw.push(event.clone());
        Ok(ArchiveRecordId(inner.raw.len() as u64))
    }
}
