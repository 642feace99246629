//! Webhook payload extraction.
//!
//! Turns a provider payload into a provider-agnostic [`PrSnapshot`] by looking
//! up fixed field paths. Extraction is deliberately lenient:
//!
//! 1. The payload must be a JSON object carrying a `pull_request` object,
//!    otherwise it is not a pull request event and [`ExtractionError`] is
//!    returned.
//! 2. Any individual field that is missing, `null` or of an unexpected type
//!    extracts as an empty value. The raw archive still holds the original.
//! 3. `action` is copied as-is; new provider verbs pass straight through.

use chrono::{DateTime, Utc};
use serde_json::Value;
use thiserror::Error;

use crate::types::{BranchRef, ExternalPrId, GitHost, PrSnapshot};

/// Error type for payloads that are not recognizable pull request events.
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// The payload is not JSON.
    #[error("payload is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    /// The payload is JSON but not an object.
    #[error("payload is not a JSON object")]
    NotAnObject,

    /// The payload has no `pull_request` object.
    #[error("payload is not a pull request event: missing {0}")]
    NotAPullRequestEvent(&'static str),
}

/// JSON pointers locating each snapshot field in one provider's payload.
#[derive(Debug, Clone, Copy)]
pub struct FieldPaths {
    /// Object whose presence identifies a pull request event.
    pub pull_request: &'static str,
    pub pr_id: &'static str,
    pub url: &'static str,
    pub title: &'static str,
    pub source_branch: &'static str,
    pub source_hash: &'static str,
    pub target_branch: &'static str,
    pub target_hash: &'static str,
    pub created_at: &'static str,
    pub updated_at: &'static str,
    pub state: &'static str,
    pub action: &'static str,
    pub repository_url: &'static str,
    pub author: &'static str,
}

/// Field layout of GitHub `pull_request` webhooks.
pub const GITHUB_FIELDS: FieldPaths = FieldPaths {
    pull_request: "/pull_request",
    pr_id: "/pull_request/id",
    url: "/pull_request/html_url",
    title: "/pull_request/title",
    source_branch: "/pull_request/head/ref",
    source_hash: "/pull_request/head/sha",
    target_branch: "/pull_request/base/ref",
    target_hash: "/pull_request/base/sha",
    created_at: "/pull_request/created_at",
    updated_at: "/pull_request/updated_at",
    state: "/pull_request/state",
    action: "/action",
    repository_url: "/repository/html_url",
    author: "/sender/login",
};

/// The value of `state` that marks a pull request as open.
const OPEN_STATE: &str = "open";

impl GitHost {
    /// Returns the payload layout for this provider.
    pub fn field_paths(&self) -> &'static FieldPaths {
        match self {
            GitHost::Github => &GITHUB_FIELDS,
        }
    }
}

/// Extracts a pull request snapshot from a raw payload.
///
/// # Examples
///
/// ```
/// use webhook_sensor::types::GitHost;
/// use webhook_sensor::webhooks::extract;
///
/// let payload = r#"{
///     "action": "opened",
///     "pull_request": { "id": 42, "state": "open", "title": "Add login" }
/// }"#;
///
/// let snapshot = extract(GitHost::Github, payload).unwrap();
/// assert_eq!(snapshot.pr_id.as_str(), "42");
/// assert!(snapshot.is_open);
/// assert_eq!(snapshot.url, "");
/// ```
pub fn extract(host: GitHost, payload: &str) -> Result<PrSnapshot, ExtractionError> {
    let root: Value = serde_json::from_str(payload)?;
    extract_value(host, &root)
}

/// Extracts a snapshot from an already-parsed payload.
pub fn extract_value(host: GitHost, root: &Value) -> Result<PrSnapshot, ExtractionError> {
    if !root.is_object() {
        return Err(ExtractionError::NotAnObject);
    }

    let paths = host.field_paths();
    if !root.pointer(paths.pull_request).is_some_and(Value::is_object) {
        return Err(ExtractionError::NotAPullRequestEvent("pull_request"));
    }

    let text = |path: &str| scalar_text(root.pointer(path));

    Ok(PrSnapshot {
        host,
        pr_id: ExternalPrId::new(text(paths.pr_id)),
        url: text(paths.url),
        title: text(paths.title),
        source: BranchRef {
            name: text(paths.source_branch),
            hash: text(paths.source_hash),
        },
        target: BranchRef {
            name: text(paths.target_branch),
            hash: text(paths.target_hash),
        },
        author: text(paths.author),
        repository_url: text(paths.repository_url),
        is_open: text(paths.state) == OPEN_STATE,
        action: text(paths.action),
        provider_created_at: timestamp(root.pointer(paths.created_at)),
        provider_updated_at: timestamp(root.pointer(paths.updated_at)),
    })
}

/// Renders a scalar as text; anything else (missing, null, array, object) is
/// empty.
fn scalar_text(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}

fn timestamp(value: Option<&Value>) -> Option<DateTime<Utc>> {
    value
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}
