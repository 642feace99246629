//! Durability helpers for the file-backed store.
//!
//! A record is only acknowledged to the pipeline once both the log file and
//! its directory entry have been synced. Creating a log file updates the
//! directory, and that entry can be lost on power failure unless the directory
//! itself is synced too.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::Path;

/// Flushes a file's contents and metadata to stable storage.
pub fn fsync_file(file: &File) -> io::Result<()> {
    file.sync_all()
}

/// Flushes a directory's entries to stable storage.
///
/// Only meaningful for directories; the caller is expected to pass one.
pub fn fsync_dir(dir_path: &Path) -> io::Result<()> {
    let dir = OpenOptions::new().read(true).open(dir_path)?;
    dir.sync_all()
}

/// Creates `dir_path` (and parents) if needed, then syncs its parent so the
/// new entry survives a crash.
pub fn ensure_dir(dir_path: &Path) -> io::Result<()> {
    if dir_path.is_dir() {
        return Ok(());
    }
    std::fs::create_dir_all(dir_path)?;
    if let Some(parent) = dir_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fsync_dir(parent)?;
    }
    Ok(())
}
