//! Append-only JSON Lines log with crash-safe replay.
//!
//! Each line is one [`LogEntry`]: a monotonic sequence number, a timestamp and
//! the record flattened alongside them:
//!
//! ```json
//! {"seq":3,"ts":"2024-01-15T10:00:00Z","host":"github","payload":"{...}","received_at":"..."}
//! ```
//!
//! Every append is fsynced before it returns, so an acknowledged record
//! survives a crash. A crash mid-write leaves at most one partial final line,
//! which [`RecordLog::replay`] detects and truncates.

use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::fsync::fsync_file;

/// Errors that can occur during log operations.
#[derive(Debug, Error)]
pub enum LogError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A failed append could not be rolled back; the file may end in a
    /// partial line, so no further appends are accepted.
    #[error("log {0} is poisoned by a failed append")]
    Poisoned(PathBuf),
}

pub type Result<T> = std::result::Result<T, LogError>;

/// One line of a [`RecordLog`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry<T> {
    pub seq: u64,
    pub ts: DateTime<Utc>,
    #[serde(flatten)]
    pub record: T,
}

/// An append-only log of records of type `T`.
pub struct RecordLog<T> {
    file: File,
    path: PathBuf,
    next_seq: u64,
    poisoned: bool,
    _record: PhantomData<fn(T)>,
}

impl<T> RecordLog<T>
where
    T: Serialize + DeserializeOwned,
{
    /// Replays the log at `path` (truncating a torn tail) and opens it for
    /// appending after the last valid entry.
    ///
    /// Returns the log together with every entry replayed.
    pub fn open(path: impl AsRef<Path>) -> Result<(Self, Vec<LogEntry<T>>)> {
        let path = path.as_ref().to_path_buf();
        let (entries, next_seq) = Self::replay(&path)?;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .read(true)
            .open(&path)?;

        let log = RecordLog {
            file,
            path,
            next_seq,
            poisoned: false,
            _record: PhantomData,
        };
        Ok((log, entries))
    }

    /// Appends a record, assigning it the next sequence number and the current
    /// time, and syncs the file before returning.
    ///
    /// If the write or the sync fails, the file is cut back to its length
    /// before the append, so a later append never lands after a partial line.
    pub fn append(&mut self, record: T) -> Result<LogEntry<T>> {
        self.append_with(record, |file, line| {
            file.write_all(line)?;
            fsync_file(file)
        })
    }

    fn append_with<W>(&mut self, record: T, write: W) -> Result<LogEntry<T>>
    where
        W: FnOnce(&mut File, &[u8]) -> io::Result<()>,
    {
        if self.poisoned {
            return Err(LogError::Poisoned(self.path.clone()));
        }

        let entry = LogEntry {
            seq: self.next_seq,
            ts: Utc::now(),
            record,
        };
        let mut line = serde_json::to_vec(&entry)?;
        line.push(b'\n');

        let valid_len = self.file.metadata()?.len();
        if let Err(e) = write(&mut self.file, &line) {
            let rollback = self
                .file
                .set_len(valid_len)
                .and_then(|()| fsync_file(&self.file));
            if let Err(rollback_err) = rollback {
                self.poisoned = true;
                tracing::error!(
                    path = %self.path.display(),
                    error = %rollback_err,
                    "Failed to roll back partial append"
                );
            }
            return Err(e.into());
        }

        self.next_seq += 1;
        Ok(entry)
    }

    pub fn next_seq(&self) -> u64 {
        self.next_seq
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads every valid entry from `path`.
    ///
    /// Reading stops at the first line that fails to parse or whose sequence
    /// number does not increase; the file is truncated at the start of that
    /// line. A missing file replays as empty.
    ///
    /// Returns `(entries, next_seq)`.
    pub fn replay(path: &Path) -> Result<(Vec<LogEntry<T>>, u64)> {
        if !path.exists() {
            return Ok((vec![], 0));
        }

        let file = File::open(path)?;
        let file_len = file.metadata()?.len();
        let mut reader = BufReader::new(file);

        let mut entries = Vec::new();
        let mut last_valid_pos = 0u64;
        let mut current_pos = 0u64;
        let mut max_seq: Option<u64> = None;

        loop {
            // Read raw bytes: a torn write can split a UTF-8 sequence.
            let mut line = Vec::new();
            let bytes_read = reader.read_until(b'\n', &mut line)?;
            if bytes_read == 0 {
                break;
            }

            let line_start = current_pos;
            current_pos += bytes_read as u64;

            if line.iter().all(u8::is_ascii_whitespace) {
                last_valid_pos = current_pos;
                continue;
            }

            // A line without its newline never finished being written.
            if line.last() != Some(&b'\n') {
                last_valid_pos = line_start;
                break;
            }

            match serde_json::from_slice::<LogEntry<T>>(&line) {
                Ok(entry) if max_seq.is_none_or(|prev| entry.seq > prev) => {
                    max_seq = Some(entry.seq);
                    entries.push(entry);
                    last_valid_pos = current_pos;
                }
                _ => {
                    last_valid_pos = line_start;
                    break;
                }
            }
        }

        if last_valid_pos < file_len {
            tracing::warn!(
                path = %path.display(),
                valid_len = last_valid_pos,
                file_len,
                "Truncating torn tail of record log"
            );
            let file = OpenOptions::new().write(true).open(path)?;
            file.set_len(last_valid_pos)?;
            fsync_file(&file)?;
        }

        let next_seq = max_seq.map(|s| s + 1).unwrap_or(0);
        Ok((entries, next_seq))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use tempfile::tempdir;

    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    struct Note {
        text: String,
    }

    fn note(text: &str) -> Note {
        Note {
            text: text.to_string(),
        }
    }

    fn arb_note() -> impl Strategy<Value = Note> {
        ".{0,40}".prop_map(|text| Note { text })
    }

    #[test]
    fn open_creates_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("notes.log");

        let (_log, entries) = RecordLog::<Note>::open(&path).unwrap();
        assert!(path.exists());
        assert!(entries.is_empty());
    }

    #[test]
    fn append_writes_flattened_json_line() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("notes.log");

        let (mut log, _) = RecordLog::open(&path).unwrap();
        log.append(note("hello")).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let line: serde_json::Value = serde_json::from_str(content.trim_end()).unwrap();
        assert_eq!(line["seq"], 0);
        assert_eq!(line["text"], "hello");
        assert!(line.get("ts").is_some());
    }

    #[test]
    fn reopen_continues_sequence() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("notes.log");

        let (mut log, _) = RecordLog::open(&path).unwrap();
        log.append(note("a")).unwrap();
        log.append(note("b")).unwrap();
        drop(log);

        let (mut log, entries) = RecordLog::<Note>::open(&path).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(log.next_seq(), 2);

        let entry = log.append(note("c")).unwrap();
        assert_eq!(entry.seq, 2);
    }

    #[test]
    fn replay_missing_file_is_empty() {
        let dir = tempdir().unwrap();
        let (entries, next_seq) =
            RecordLog::<Note>::replay(&dir.path().join("missing.log")).unwrap();
        assert!(entries.is_empty());
        assert_eq!(next_seq, 0);
    }

    #[test]
    fn torn_final_line_is_truncated() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("notes.log");

        let (mut log, _) = RecordLog::open(&path).unwrap();
        log.append(note("kept")).unwrap();
        drop(log);
        let valid_len = std::fs::metadata(&path).unwrap().len();

        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        write!(file, r#"{{"seq":1,"ts":"2024-01-01T00:00:00Z","te"#).unwrap();
        drop(file);

        let (entries, next_seq) = RecordLog::<Note>::replay(&path).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(next_seq, 1);
        assert_eq!(std::fs::metadata(&path).unwrap().len(), valid_len);
    }

    #[test]
    fn non_monotonic_sequence_stops_replay() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("notes.log");

        let (mut log, _) = RecordLog::open(&path).unwrap();
        log.append(note("a")).unwrap();
        log.append(note("b")).unwrap();
        drop(log);

        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        writeln!(file, r#"{{"seq":1,"ts":"2024-01-01T00:00:00Z","text":"dup"}}"#).unwrap();
        writeln!(file, r#"{{"seq":2,"ts":"2024-01-01T00:00:01Z","text":"after"}}"#).unwrap();
        drop(file);

        let (entries, next_seq) = RecordLog::<Note>::replay(&path).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(next_seq, 2);

        let (again, _) = RecordLog::<Note>::replay(&path).unwrap();
        assert_eq!(again.len(), 2, "corrupt tail should have been truncated");
    }

    #[test]
    fn failed_append_is_rolled_back_before_next_append() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("notes.log");

        let (mut log, _) = RecordLog::open(&path).unwrap();
        log.append(note("a")).unwrap();

        // Half the line reaches the file, then the sync fails.
        let err = log
            .append_with(note("torn"), |file, line| {
                file.write_all(&line[..line.len() / 2])?;
                Err(io::Error::other("sync failed"))
            })
            .unwrap_err();
        assert!(matches!(err, LogError::Io(_)));
        assert_eq!(log.next_seq(), 1);

        let entry = log.append(note("b")).unwrap();
        assert_eq!(entry.seq, 1);
        log.append(note("c")).unwrap();
        drop(log);

        let (reopened, entries) = RecordLog::<Note>::open(&path).unwrap();
        let texts: Vec<_> = entries.iter().map(|e| e.record.text.as_str()).collect();
        assert_eq!(texts, ["a", "b", "c"]);
        assert_eq!(reopened.next_seq(), 3);
    }

    #[test]
    fn full_line_written_before_failed_sync_is_rolled_back() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("notes.log");

        let (mut log, _) = RecordLog::open(&path).unwrap();
        log.append(note("a")).unwrap();
        let len = std::fs::metadata(&path).unwrap().len();

        log.append_with(note("unsynced"), |file, line| {
            file.write_all(line)?;
            Err(io::Error::other("sync failed"))
        })
        .unwrap_err();

        assert_eq!(std::fs::metadata(&path).unwrap().len(), len);
        assert_eq!(log.append(note("b")).unwrap().seq, 1);
    }

    #[test]
    fn poisoned_log_refuses_appends() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("notes.log");

        let (mut log, _) = RecordLog::<Note>::open(&path).unwrap();
        log.poisoned = true;

        let err = log.append(note("a")).unwrap_err();
        assert!(matches!(err, LogError::Poisoned(ref p) if p == &path));
    }

    proptest! {
        /// Whatever was appended is replayed, in order.
        #[test]
        fn appended_records_replay_in_order(notes in prop::collection::vec(arb_note(), 1..20)) {
            let dir = tempdir().unwrap();
            let path = dir.path().join("notes.log");

            let (mut log, _) = RecordLog::open(&path).unwrap();
            for n in &notes {
                log.append(n.clone()).unwrap();
            }
            drop(log);

            let (entries, next_seq) = RecordLog::<Note>::replay(&path).unwrap();
            prop_assert_eq!(next_seq, notes.len() as u64);
            let replayed: Vec<Note> = entries.into_iter().map(|e| e.record).collect();
            prop_assert_eq!(replayed, notes);
        }

        /// Cutting the file anywhere recovers a prefix of what was written.
        #[test]
        fn crash_at_any_byte_recovers_prefix(
            notes in prop::collection::vec(arb_note(), 2..10),
            cut_ratio in 0.0f64..1.0,
        ) {
            let dir = tempdir().unwrap();
            let path = dir.path().join("notes.log");

            let (mut log, _) = RecordLog::open(&path).unwrap();
            for n in &notes {
                log.append(n.clone()).unwrap();
            }
            drop(log);

            let len = std::fs::metadata(&path).unwrap().len();
            let cut = (len as f64 * cut_ratio) as u64;
            OpenOptions::new().write(true).open(&path).unwrap().set_len(cut).unwrap();

            let (entries, next_seq) = RecordLog::<Note>::replay(&path).unwrap();
            prop_assert!(entries.len() <= notes.len());
            prop_assert_eq!(next_seq, entries.len() as u64);
            for (i, entry) in entries.iter().enumerate() {
                prop_assert_eq!(entry.seq, i as u64);
                prop_assert_eq!(&entry.record, &notes[i]);
            }
        }
    }
}
