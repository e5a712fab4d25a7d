//! Append-only JSONL record log.
//!
//! The log is the source of truth: one complete JSON snapshot per line, in
//! write order. Nothing ever rewrites it except an explicit [`RecordLog::compact`].

use crate::atomic::write_atomic;
use crate::error::Result;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// A record that can live in a [`RecordLog`] and be folded into an index.
pub trait LogRecord: Serialize + DeserializeOwned + Clone {
    /// Identity key; the latest snapshot per key wins on replay.
    fn record_id(&self) -> &str;

    /// Optional grouping key maintained by the index (`by_repo` on disk).
    fn partition(&self) -> Option<&str> {
        None
    }
}

/// Result of reading a log from the beginning.
#[derive(Debug)]
pub struct Replay<R> {
    /// Every parseable snapshot, oldest first.
    pub records: Vec<R>,
    /// 1-based numbers of lines that failed to parse.
    pub corrupt_lines: Vec<usize>,
    /// Number of non-blank lines seen.
    pub total_lines: usize,
    /// Size of the log as read; an index built from this replay reflects it.
    pub bytes_read: u64,
}

impl<R: LogRecord> Replay<R> {
    /// Folds the replay to the latest snapshot per id, in order of first appearance.
    pub fn latest(&self) -> Vec<R> {
        latest_snapshots(self.records.iter().cloned())
    }
}

/// Report from a compaction, dry run or applied.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct CompactReport {
    /// Non-blank lines in the log before compaction.
    pub original_lines: usize,
    /// Distinct record ids.
    pub unique_records: usize,
    /// Lines a compaction drops (superseded snapshots plus corrupt lines).
    pub lines_removed: usize,
    /// Corrupt lines among `original_lines`.
    pub corrupt_lines: usize,
    /// True if the log file was rewritten.
    pub applied: bool,
}

/// Keeps the last snapshot for each id, ordered by the id's first appearance.
pub fn latest_snapshots<R: LogRecord>(records: impl IntoIterator<Item = R>) -> Vec<R> {
    let mut position: HashMap<String, usize> = HashMap::new();
    let mut latest: Vec<R> = Vec::new();

    for record in records {
        match position.get(record.record_id()) {
            Some(&slot) => latest[slot] = record,
            None => {
                position.insert(record.record_id().to_string(), latest.len());
                latest.push(record);
            }
        }
    }

    latest
}

/// Handle on an append-only JSONL file.
#[derive(Debug, Clone)]
pub struct RecordLog {
    path: PathBuf,
}

impl RecordLog {
    /// Creates a handle; the file is created on first append.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Path of the log file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current size in bytes, 0 if the file does not exist yet.
    pub fn len_bytes(&self) -> Result<u64> {
        match fs::metadata(&self.path) {
            Ok(meta) => Ok(meta.len()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(0),
            Err(e) => Err(e.into()),
        }
    }

    /// Appends one snapshot as a single line and returns the new log size.
    ///
    /// If a previous writer died mid-line, a line break is written first so the
    /// torn fragment stays isolated and this record remains parseable.
    ///
    /// # Errors
    ///
    /// Any I/O failure. Callers must treat this as fatal.
    pub fn append<R: LogRecord>(&self, record: &R) -> Result<u64> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');

        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&self.path)?;

        if ends_mid_line(&mut file)? {
            warn!(path = %self.path.display(), "log ends with a partial line; isolating it");
            line.insert(0, b'\n');
        }

        file.write_all(&line)?;
        file.sync_data()?;

        Ok(file.metadata()?.len())
    }

    /// Reads every snapshot from the beginning of the log.
    ///
    /// Unparseable lines, and lines that parse but carry an empty id, are
    /// skipped and reported, never fatal. A missing file replays as empty.
    pub fn replay<R: LogRecord>(&self) -> Result<Replay<R>> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };

        let mut replay = Replay {
            records: Vec::new(),
            corrupt_lines: Vec::new(),
            total_lines: 0,
            bytes_read: bytes.len() as u64,
        };

        for (idx, raw) in bytes.split(|b| *b == b'\n').enumerate() {
            if raw.iter().all(|b| b.is_ascii_whitespace()) {
                continue;
            }
            replay.total_lines += 1;

            match serde_json::from_slice::<R>(raw) {
                Ok(record) if !record.record_id().is_empty() => replay.records.push(record),
                Ok(_) => {
                    warn!(
                        path = %self.path.display(),
                        line = idx + 1,
                        "skipping log line without a record id"
                    );
                    replay.corrupt_lines.push(idx + 1);
                }
                Err(e) => {
                    warn!(
                        path = %self.path.display(),
                        line = idx + 1,
                        error = %e,
                        "skipping corrupt log line"
                    );
                    replay.corrupt_lines.push(idx + 1);
                }
            }
        }

        debug!(
            path = %self.path.display(),
            records = replay.records.len(),
            corrupt = replay.corrupt_lines.len(),
            "replayed log"
        );

        Ok(replay)
    }

    /// Reduces the log to the latest snapshot per id.
    ///
    /// With `apply == false` this only reports. With `apply == true` the file
    /// is replaced atomically, and only if something would be removed.
    pub fn compact<R: LogRecord>(&self, apply: bool) -> Result<CompactReport> {
        let replay = self.replay::<R>()?;
        let latest = replay.latest();

        let mut report = CompactReport {
            original_lines: replay.total_lines,
            unique_records: latest.len(),
            lines_removed: replay.total_lines - latest.len(),
            corrupt_lines: replay.corrupt_lines.len(),
            applied: false,
        };

        if apply && report.lines_removed > 0 {
            let mut contents = Vec::new();
            for record in &latest {
                contents.extend(serde_json::to_vec(record)?);
                contents.push(b'\n');
            }
            write_atomic(&self.path, &contents)?;
            report.applied = true;
            debug!(
                path = %self.path.display(),
                removed = report.lines_removed,
                "compacted log"
            );
        }

        Ok(report)
    }
}

fn ends_mid_line(file: &mut File) -> Result<bool> {
    let len = file.metadata()?.len();
    if len == 0 {
        return Ok(false);
    }
    file.seek(SeekFrom::Start(len - 1))?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last)?;
    Ok(last[0] != b'\n')
}
