//! Pull request state reconciliation.
//!
//! Reconciliation is an upsert keyed on the provider's identity for a pull
//! request, `(host, external id)`, never on the store's row id:
//!
//! | Stored record | Result |
//! |---------------|--------|
//! | none | insert; `created_on = now`, `updated_on = None` |
//! | present | update; keep `id` and `created_on`, `updated_on = now` (strictly after the previous write), every other field replaced |
//!
//! The replace is total: a later snapshot that lacks a field blanks the stored
//! value. Reconciliations for one key are serialized through [`KeyedLocks`] so
//! concurrent deliveries for the same pull request cannot lose each other's
//! writes; which delivery lands last is still decided by arrival order, not by
//! provider timestamps.

mod keyed_lock;

use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use tracing::{debug, error, instrument};

use crate::store::{PrStore, StoreError};
use crate::types::{NewPullRequest, PrKey, PrSnapshot, PullRequestState};

pub use keyed_lock::{KeyGuard, KeyedLocks};

/// Applies snapshots to the store.
pub struct Reconciler<S> {
    store: Arc<S>,
    locks: Arc<KeyedLocks<PrKey>>,
}

impl<S> Clone for Reconciler<S> {
    fn clone(&self) -> Self {
        Reconciler {
            store: Arc::clone(&self.store),
            locks: Arc::clone(&self.locks),
        }
    }
}

impl<S: PrStore> Reconciler<S> {
    pub fn new(store: Arc<S>) -> Self {
        Reconciler {
            store,
            locks: Arc::new(KeyedLocks::new()),
        }
    }

    /// Upserts `snapshot` and returns the record as stored.
    ///
    /// On any store error nothing further is written and the error is
    /// returned; the record must not be announced.
    #[instrument(skip_all, fields(key = %snapshot.key(), action = %snapshot.action))]
    pub async fn reconcile(&self, snapshot: PrSnapshot) -> Result<PullRequestState, StoreError> {
        let key = snapshot.key();
        let _guard = self.locks.lock(&key).await;

        let existing = self.store.get_pr(&key).await.inspect_err(|e| {
            error!(error = %e, "Failed to read existing pull request");
        })?;

        match existing {
            Some(stored) => {
                let state = replace_snapshot(&stored, snapshot, Utc::now());
                self.store.update_pr(&state).await.inspect_err(|e| {
                    error!(record_id = %state.id, error = %e, "Failed to update pull request");
                })?;
                debug!(record_id = %state.id, is_open = state.snapshot.is_open, "Updated pull request");
                Ok(state)
            }
            None => {
                let draft = NewPullRequest {
                    snapshot,
                    created_on: Utc::now(),
                };
                let id = self.store.insert_pr(&draft).await.inspect_err(|e| {
                    error!(error = %e, "Failed to insert pull request");
                })?;
                debug!(record_id = %id, "Inserted pull request");
                Ok(draft.into_state(id))
            }
        }
    }
}

/// Builds the next version of `stored` from `incoming`.
///
/// The new `updated_on` is strictly later than the stored record's last
/// write, even if the wall clock stalls or moves backwards. Every version of a
/// record therefore has its own [`PullRequestState::version_id`].
pub fn replace_snapshot(
    stored: &PullRequestState,
    incoming: PrSnapshot,
    now: DateTime<Utc>,
) -> PullRequestState {
    let previous = stored.last_written_at();
    let written = if now > previous {
        now
    } else {
        previous + TimeDelta::nanoseconds(1)
    };

    PullRequestState {
        id: stored.id,
        snapshot: incoming,
        created_on: stored.created_on,
        updated_on: Some(written),
    }
}
