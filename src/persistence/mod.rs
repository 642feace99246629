//! Crash-safe file primitives backing [`crate::store::FileStore`].
//!
//! # File Layout
//!
//! ```text
//! <state_dir>/
//!   raw_events.log      # archived deliveries (JSON Lines, one per delivery)
//!   pull_requests.log   # inserts and updates of PR records (JSON Lines)
//! ```
//!
//! Both logs are append-only. Every append is fsynced before the store
//! acknowledges the write; a torn final line left by a crash is truncated on
//! the next open.

pub mod fsync;
pub mod log;

pub use fsync::{ensure_dir, fsync_dir, fsync_file};
pub use log::{LogEntry, LogError, RecordLog};
