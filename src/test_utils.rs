//! Shared test doubles, payload builders and property-test generators.

use std::collections::HashSet;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use proptest::prelude::*;
use serde_json::json;

use crate::store::{MemoryStore, PrStore, StoreError};
use crate::transport::{EventPublisher, OutboundMessage, PublishReceipt, TransportError};
use crate::types::{
    ArchiveRecordId, BranchRef, GitHost, NewPullRequest, PrKey, PrRecordId, PrSnapshot,
    PullRequestState, RawWebhookEvent,
};

/// A snapshot for `id` with branch and URL fields filled in and no title.
pub fn snapshot(id: &str, action: &str, is_open: bool) -> PrSnapshot {
    let mut snapshot = PrSnapshot::empty(GitHost::Github, id);
    snapshot.url = format!("https://github.com/octocat/hello-world/pull/{id}");
    snapshot.source = BranchRef {
        name: "feature/login".to_string(),
        hash: "a".repeat(40),
    };
    snapshot.target = BranchRef {
        name: "main".to_string(),
        hash: "b".repeat(40),
    };
    snapshot.author = "octocat".to_string();
    snapshot.repository_url = "https://github.com/octocat/hello-world".to_string();
    snapshot.is_open = is_open;
    snapshot.action = action.to_string();
    snapshot
}

/// A GitHub `pull_request` webhook body.
pub fn github_payload(pr_id: u64, action: &str, state: &str) -> String {
    json!({
        "action": action,
        "number": 7,
        "pull_request": {
            "id": pr_id,
            "html_url": "https://github.com/octocat/hello-world/pull/7",
            "title": "Add login",
            "state": state,
            "created_at": "2024-01-15T10:00:00Z",
            "updated_at": "2024-01-15T11:00:00Z",
            "head": { "ref": "feature/login", "sha": "a".repeat(40) },
            "base": { "ref": "main", "sha": "b".repeat(40) }
        },
        "repository": { "html_url": "https://github.com/octocat/hello-world" },
        "sender": { "login": "octocat" }
    })
    .to_string()
}

pub fn arb_action() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("opened".to_string()),
        Just("closed".to_string()),
        Just("reopened".to_string()),
        Just("synchronize".to_string()),
        "[a-z_]{1,20}",
    ]
}

/// Any webhook body: valid pull request events, other JSON, and junk.
pub fn arb_payload() -> impl Strategy<Value = String> {
    prop_oneof![
        (1u64..1000, arb_action(), prop_oneof![Just("open"), Just("closed")])
            .prop_map(|(id, action, state)| github_payload(id, &action, state)),
        Just(r#"{"action":"created","issue":{}}"#.to_string()),
        Just("[]".to_string()),
        ".{0,40}",
    ]
}

/// A [`MemoryStore`] whose operations can be made to fail on demand.
#[derive(Debug, Default)]
pub struct FaultyStore {
    inner: MemoryStore,
    fail_raw: AtomicBool,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    raw_calls: AtomicUsize,
    insert_calls: AtomicUsize,
    update_calls: AtomicUsize,
}

impl FaultyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inner(&self) -> &MemoryStore {
        &self.inner
    }

    pub fn fail_raw_inserts(&self) {
        self.fail_raw.store(true, Ordering::SeqCst);
    }

    pub fn fail_reads(&self) {
        self.fail_reads.store(true, Ordering::SeqCst);
    }

    pub fn fail_writes(&self) {
        self.fail_writes.store(true, Ordering::SeqCst);
    }

    pub fn raw_calls(&self) -> usize {
        self.raw_calls.load(Ordering::SeqCst)
    }

    pub fn insert_calls(&self) -> usize {
        self.insert_calls.load(Ordering::SeqCst)
    }

    pub fn update_calls(&self) -> usize {
        self.update_calls.load(Ordering::SeqCst)
    }

    fn check(flag: &AtomicBool, what: &str) -> Result<(), StoreError> {
        if flag.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(format!("injected {what} failure")));
        }
        Ok(())
    }
}

impl PrStore for FaultyStore {
    async fn get_pr(&self, key: &PrKey) -> Result<Option<PullRequestState>, StoreError> {
        Self::check(&self.fail_reads, "read")?;
        self.inner.get_pr(key).await
    }

    async fn insert_pr(&self, record: &NewPullRequest) -> Result<PrRecordId, StoreError> {
        Self::check(&self.fail_writes, "write")?;
        self.insert_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.insert_pr(record).await
    }

    async fn update_pr(&self, state: &PullRequestState) -> Result<(), StoreError> {
        Self::check(&self.fail_writes, "write")?;
        self.update_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.update_pr(state).await
    }

    async fn insert_raw(&self, event: &RawWebhookEvent) -> Result<ArchiveRecordId, StoreError> {
        Self::check(&self.fail_raw, "archive")?;
        self.raw_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.insert_raw(event).await
    }
}

/// An in-process broker stand-in that keeps every message it accepts.
///
/// Dedupe ids seen before are acknowledged as duplicates and not stored
/// again. [`RecordingPublisher::go_offline`] makes every publish fail the way
/// a disconnected session does.
#[derive(Debug, Default)]
pub struct RecordingPublisher {
    offline: AtomicBool,
    state: Mutex<Recorded>,
}

#[derive(Debug, Default)]
struct Recorded {
    messages: Vec<(String, OutboundMessage)>,
    seen_ids: HashSet<String>,
    sequence: u64,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn go_offline(&self) {
        self.offline.store(true, Ordering::SeqCst);
    }

    pub fn come_online(&self) {
        self.offline.store(false, Ordering::SeqCst);
    }

    /// Every publish attempt the broker accepted, duplicates included.
    pub fn published(&self) -> Vec<(String, OutboundMessage)> {
        self.state.lock().unwrap().messages.clone()
    }

    /// Number of messages actually stored (duplicates excluded).
    pub fn stored_count(&self) -> u64 {
        self.state.lock().unwrap().sequence
    }
}

impl EventPublisher for RecordingPublisher {
    async fn publish(
        &self,
        topic: &str,
        message: OutboundMessage,
    ) -> Result<PublishReceipt, TransportError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(TransportError::Unavailable("broker connection is Disconnected".into()));
        }

        let mut state = self.state.lock().unwrap();
        let duplicate = match &message.dedupe_id {
            Some(id) => !state.seen_ids.insert(id.clone()),
            None => false,
        };
        if !duplicate {
            state.sequence += 1;
        }
        let sequence = state.sequence;
        state.messages.push((topic.to_string(), message));

        Ok(PublishReceipt {
            stream: "ORCHESTRATOR".to_string(),
            sequence,
            duplicate,
        })
    }
}
