//! Core domain types for the webhook sensor.
//!
//! Identifiers are newtypes so that the provider's pull request id, the
//! store's record ids and the archive ids cannot be mixed up.

pub mod ids;
pub mod pr;
pub mod raw;

pub use ids::{ArchiveRecordId, ExternalPrId, GitHost, PrKey, PrRecordId, UnknownGitHost};
pub use pr::{BranchRef, NewPullRequest, PrSnapshot, PullRequestState};
pub use raw::RawWebhookEvent;
