//! Newtype wrappers for domain identifiers.
//!
//! These types keep the provider's identity for a pull request (the
//! [`ExternalPrId`]) apart from the identities the store assigns
//! ([`PrRecordId`], [`ArchiveRecordId`]), so the reconciliation key can never be
//! confused with a row id.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// The code-hosting provider a webhook delivery came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GitHost {
    /// github.com (or GitHub Enterprise, which shares the payload shape).
    Github,
}

impl GitHost {
    /// Returns the lowercase name used in storage keys, routes and dedupe ids.
    pub fn as_str(&self) -> &'static str {
        match self {
            GitHost::Github => "github",
        }
    }
}

impl fmt::Display for GitHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a host name does not match any supported provider.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown git host: {0}")]
pub struct UnknownGitHost(pub String);

impl FromStr for GitHost {
    type Err = UnknownGitHost;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "github" => Ok(GitHost::Github),
            _ => Err(UnknownGitHost(s.to_string())),
        }
    }
}

/// The identifier a provider assigns to a pull request.
///
/// Kept as text: providers disagree on whether this is numeric, and the
/// extractor renders whatever scalar it finds. An absent id extracts as the
/// empty string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExternalPrId(pub String);

impl ExternalPrId {
    pub fn new(s: impl Into<String>) -> Self {
        ExternalPrId(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ExternalPrId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ExternalPrId {
    fn from(s: &str) -> Self {
        ExternalPrId(s.to_string())
    }
}

impl From<String> for ExternalPrId {
    fn from(s: String) -> Self {
        ExternalPrId(s)
    }
}

/// The reconciliation key: at most one pull request record exists per key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PrKey {
    pub host: GitHost,
    pub pr_id: ExternalPrId,
}

impl PrKey {
    pub fn new(host: GitHost, pr_id: impl Into<ExternalPrId>) -> Self {
        PrKey {
            host,
            pr_id: pr_id.into(),
        }
    }
}

impl fmt::Display for PrKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.pr_id)
    }
}

/// Store-assigned primary key of a pull request record. Starts at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrRecordId(pub u64);

impl fmt::Display for PrRecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Store-assigned primary key of an archived raw webhook payload. Starts at 1,
/// like [`PrRecordId`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArchiveRecordId(pub u64);

impl fmt::Display for ArchiveRecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
