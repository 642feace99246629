//! In-memory index of pull request records shared by both store backends.
//!
//! Enforces the store-level invariants: one record per [`PrKey`], ids never
//! reused, and updates never re-key a record.

use std::collections::HashMap;

use super::{Result, StoreError};
use crate::types::{NewPullRequest, PrKey, PrRecordId, PullRequestState};

#[derive(Debug, Default)]
pub(super) struct PrIndex {
    records: HashMap<PrRecordId, PullRequestState>,
    by_key: HashMap<PrKey, PrRecordId>,
    next_id: u64,
}

impl PrIndex {
    pub(super) fn new() -> Self {
        PrIndex {
            next_id: 1,
            ..Default::default()
        }
    }

    pub(super) fn get(&self, key: &PrKey) -> Option<&PullRequestState> {
        self.by_key.get(key).and_then(|id| self.records.get(id))
    }

    pub(super) fn len(&self) -> usize {
        self.records.len()
    }

    pub(super) fn records(&self) -> impl Iterator<Item = &PullRequestState> {
        self.records.values()
    }

    /// Validates an insert and returns the id the record would receive.
    /// Does not mutate the index.
    pub(super) fn prepare_insert(&self, record: &NewPullRequest) -> Result<PullRequestState> {
        let key = record.snapshot.key();
        if self.by_key.contains_key(&key) {
            return Err(StoreError::DuplicateKey(key));
        }
        Ok(record.clone().into_state(PrRecordId(self.next_id)))
    }

    /// Validates an update against the stored record. Does not mutate the index.
    pub(super) fn check_update(&self, state: &PullRequestState) -> Result<()> {
        let stored = self
            .records
            .get(&state.id)
            .ok_or(StoreError::NotFound(state.id))?;
        if stored.key() != state.key() {
            return Err(StoreError::KeyMismatch {
                id: state.id,
                stored: stored.key(),
                requested: state.key(),
            });
        }
        Ok(())
    }

    /// Records a state as stored, whether freshly inserted or overwritten.
    ///
    /// Also used on replay, where the log is the source of truth.
    pub(super) fn apply(&mut self, state: PullRequestState) {
        self.next_id = self.next_id.max(state.id.0 + 1);
        self.by_key.insert(state.key(), state.id);
        self.records.insert(state.id, state);
    }
}
