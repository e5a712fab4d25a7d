//! Derived id → latest-snapshot index.
//!
//! The index is a cache: it is always a pure fold of the log and can be
//! deleted and rebuilt at any time. It is persisted as `index.json`:
//!
//! ```text
//! {"findings": {id: record}, "by_repo": {repo: [id..]}, "last_rebuild": ts, "log_bytes": n}
//! ```
//!
//! `by_repo` is only written for partitioned (global) records. `log_bytes` is
//! the log length the index reflects; a mismatch means the index is stale.

use crate::atomic::write_json_atomic;
use crate::error::Result;
use crate::log::{LogRecord, Replay};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use tracing::warn;

/// Materialized latest state per record id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordIndex<R> {
    #[serde(rename = "findings")]
    records: BTreeMap<String, R>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    by_repo: BTreeMap<String, BTreeSet<String>>,
    #[serde(default)]
    last_rebuild: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    log_bytes: Option<u64>,
}

impl<R: LogRecord> RecordIndex<R> {
    /// An index over an empty log.
    pub fn empty() -> Self {
        Self {
            records: BTreeMap::new(),
            by_repo: BTreeMap::new(),
            last_rebuild: None,
            log_bytes: Some(0),
        }
    }

    /// Folds a replayed log into a fresh index.
    pub fn from_replay(replay: &Replay<R>, rebuilt_at: String) -> Self {
        let mut index = Self::empty();
        for record in &replay.records {
            index.upsert(record.clone());
        }
        index.last_rebuild = Some(rebuilt_at);
        index.log_bytes = Some(replay.bytes_read);
        index
    }

    /// Reads a persisted index, returning `None` if it is missing or unparseable.
    pub fn read(path: &Path) -> Option<Self> {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "index unreadable");
                return None;
            }
        };

        match serde_json::from_slice(&bytes) {
            Ok(index) => Some(index),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "index corrupt");
                None
            }
        }
    }

    /// Writes the index atomically.
    pub fn persist(&self, path: &Path) -> Result<()> {
        write_json_atomic(path, self)
    }

    /// Inserts or replaces the snapshot for the record's id.
    pub fn upsert(&mut self, record: R) {
        let id = record.record_id().to_string();

        if let Some(previous) = self.records.get(&id) {
            if previous.partition() != record.partition() {
                if let Some(old) = previous.partition() {
                    let now_empty = self.by_repo.get_mut(old).is_some_and(|ids| {
                        ids.remove(&id);
                        ids.is_empty()
                    });
                    if now_empty {
                        self.by_repo.remove(old);
                    }
                }
            }
        }

        if let Some(partition) = record.partition() {
            self.by_repo
                .entry(partition.to_string())
                .or_default()
                .insert(id.clone());
        }

        self.records.insert(id, record);
    }

    /// Latest snapshot for `id`.
    pub fn get(&self, id: &str) -> Option<&R> {
        self.records.get(id)
    }

    /// All latest snapshots, ordered by id.
    pub fn records(&self) -> impl Iterator<Item = &R> {
        self.records.values()
    }

    /// Number of distinct ids.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True if no records are indexed.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Ids grouped under a partition key.
    pub fn partition(&self, key: &str) -> Option<&BTreeSet<String>> {
        self.by_repo.get(key)
    }

    /// Every partition key with its ids.
    pub fn partitions(&self) -> &BTreeMap<String, BTreeSet<String>> {
        &self.by_repo
    }

    /// When the index was last rebuilt from the log.
    pub fn last_rebuild(&self) -> Option<&str> {
        self.last_rebuild.as_deref()
    }

    /// Log size this index reflects, if known.
    pub fn log_bytes(&self) -> Option<u64> {
        self.log_bytes
    }

    pub(crate) fn set_log_bytes(&mut self, bytes: u64) {
        self.log_bytes = Some(bytes);
    }

    /// False only when the index is known to reflect a different log length.
    ///
    /// Indexes written without `log_bytes` are trusted.
    pub fn reflects_log(&self, log_bytes: u64) -> bool {
        self.log_bytes.map_or(true, |known| known == log_bytes)
    }
}
