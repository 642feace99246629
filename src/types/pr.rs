//! Pull request snapshot and reconciled state.
//!
//! A [`PrSnapshot`] is what one webhook delivery says about a pull request.
//! A [`PullRequestState`] is the stored record after that snapshot has been
//! reconciled against whatever was stored before for the same [`PrKey`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{ExternalPrId, GitHost, PrKey, PrRecordId};

/// A branch reference as reported by the provider.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchRef {
    /// Branch name, e.g. `main` or `feature/login`.
    pub name: String,
    /// Commit hash the branch pointed at when the event was emitted.
    pub hash: String,
}

/// Provider-agnostic view of a pull request, extracted from one delivery.
///
/// Every field other than `host` may be empty: the extractor keeps partial
/// data rather than rejecting it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrSnapshot {
    pub host: GitHost,
    pub pr_id: ExternalPrId,
    pub url: String,
    pub title: String,
    pub source: BranchRef,
    pub target: BranchRef,
    pub author: String,
    pub repository_url: String,

    /// Whether the provider reported the PR as open.
    pub is_open: bool,

    /// The provider's verb for what happened (`opened`, `closed`,
    /// `synchronize`, ...). Copied verbatim; never validated.
    pub action: String,

    /// The provider's own creation timestamp for the PR.
    pub provider_created_at: Option<DateTime<Utc>>,

    /// The provider's own last-update timestamp for the PR.
    pub provider_updated_at: Option<DateTime<Utc>>,
}

impl PrSnapshot {
    /// Creates a snapshot with every optional field empty.
    pub fn empty(host: GitHost, pr_id: impl Into<ExternalPrId>) -> Self {
        PrSnapshot {
            host,
            pr_id: pr_id.into(),
            url: String::new(),
            title: String::new(),
            source: BranchRef::default(),
            target: BranchRef::default(),
            author: String::new(),
            repository_url: String::new(),
            is_open: false,
            action: String::new(),
            provider_created_at: None,
            provider_updated_at: None,
        }
    }

    /// Returns the reconciliation key for this snapshot.
    pub fn key(&self) -> PrKey {
        PrKey::new(self.host, self.pr_id.clone())
    }
}

/// A pull request record as held by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestState {
    /// Store-assigned identity, preserved across updates.
    pub id: PrRecordId,

    /// The latest snapshot, replacing whatever was there before in full.
    #[serde(flatten)]
    pub snapshot: PrSnapshot,

    /// When the record was first inserted. Never changes afterwards.
    pub created_on: DateTime<Utc>,

    /// When the record was last overwritten. `None` until the first update.
    pub updated_on: Option<DateTime<Utc>>,
}

impl PullRequestState {
    pub fn key(&self) -> PrKey {
        self.snapshot.key()
    }

    /// The timestamp of the write that produced this version of the record.
    pub fn last_written_at(&self) -> DateTime<Utc> {
        self.updated_on.unwrap_or(self.created_on)
    }

    /// Identifier downstream consumers can use to recognise redeliveries of
    /// the same version of the record.
    ///
    /// Format: `<host>:<external id>:<last write, RFC 3339 with nanoseconds>`.
    pub fn version_id(&self) -> String {
        format!(
            "{}:{}",
            self.key(),
            self.last_written_at()
                .to_rfc3339_opts(chrono::SecondsFormat::Nanos, true)
        )
    }
}

/// A pull request record that has not been assigned an id yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPullRequest {
    #[serde(flatten)]
    pub snapshot: PrSnapshot,
    pub created_on: DateTime<Utc>,
}

impl NewPullRequest {
    /// Attaches the id the store assigned on insert.
    pub fn into_state(self, id: PrRecordId) -> PullRequestState {
        PullRequestState {
            id,
            snapshot: self.snapshot,
            created_on: self.created_on,
            updated_on: None,
        }
    }
}
