//! Log and index integrity checks.
//!
//! Verification never repairs anything. It compares the persisted index file
//! against a fresh replay of the log and reports what a rebuild or a
//! compaction would fix.

use crate::error::Result;
use crate::index::RecordIndex;
use crate::log::{LogRecord, RecordLog};
use serde::Serialize;
use std::collections::HashSet;
use std::path::Path;

/// Report from verifying one store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VerifyReport {
    /// Valid snapshots in the log.
    pub log_records: usize,

    /// 1-based line numbers of log lines that did not parse or carried no id.
    pub corrupt_lines: Vec<usize>,

    /// Distinct ids in the log.
    pub unique_records: usize,

    /// True if an index file exists on disk.
    pub index_present: bool,

    /// True if the index file exists and parses.
    pub index_readable: bool,

    /// Entries in the persisted index, if it could be read.
    pub index_entries: Option<usize>,

    /// Ids in the log that the persisted index does not know.
    pub missing_from_index: Vec<String>,

    /// Ids whose indexed snapshot differs from the latest log snapshot.
    pub stale_in_index: Vec<String>,

    /// Ids in the persisted index that never appear in the log.
    pub orphaned_in_index: Vec<String>,
}

impl VerifyReport {
    /// Returns true if any issues were found.
    pub fn has_issues(&self) -> bool {
        !self.corrupt_lines.is_empty()
            || (self.index_present && !self.index_readable)
            || !self.missing_from_index.is_empty()
            || !self.stale_in_index.is_empty()
            || !self.orphaned_in_index.is_empty()
    }

    /// True if a rebuild would fix everything except corrupt log lines.
    pub fn needs_rebuild(&self) -> bool {
        (self.index_present && !self.index_readable)
            || !self.missing_from_index.is_empty()
            || !self.stale_in_index.is_empty()
            || !self.orphaned_in_index.is_empty()
    }

    /// Returns a summary message.
    pub fn summary(&self) -> String {
        if !self.has_issues() {
            return format!(
                "Store is healthy. {} records in {} log lines.",
                self.unique_records, self.log_records
            );
        }

        let mut issues = Vec::new();
        if !self.corrupt_lines.is_empty() {
            issues.push(format!("{} corrupt log lines", self.corrupt_lines.len()));
        }
        if self.index_present && !self.index_readable {
            issues.push("unreadable index".to_string());
        }
        if !self.missing_from_index.is_empty() {
            issues.push(format!("{} records missing from index", self.missing_from_index.len()));
        }
        if !self.stale_in_index.is_empty() {
            issues.push(format!("{} stale index entries", self.stale_in_index.len()));
        }
        if !self.orphaned_in_index.is_empty() {
            issues.push(format!("{} orphaned index entries", self.orphaned_in_index.len()));
        }
        format!("Store has issues: {}", issues.join(", "))
    }
}

/// Verify a log against its persisted index file.
pub fn verify<R: LogRecord>(log: &RecordLog, index_path: &Path) -> Result<VerifyReport> {
    let replay = log.replay::<R>()?;
    let latest = replay.latest();

    let mut report = VerifyReport {
        log_records: replay.records.len(),
        corrupt_lines: replay.corrupt_lines.clone(),
        unique_records: latest.len(),
        index_present: index_path.exists(),
        ..Default::default()
    };

    let Some(index) = RecordIndex::<R>::read(index_path) else {
        return Ok(report);
    };
    report.index_readable = true;
    report.index_entries = Some(index.len());

    check_entries(&latest, &index, &mut report)?;
    Ok(report)
}

fn check_entries<R: LogRecord>(
    latest: &[R],
    index: &RecordIndex<R>,
    report: &mut VerifyReport,
) -> Result<()> {
    let mut seen = HashSet::with_capacity(latest.len());

    for record in latest {
        let id = record.record_id();
        seen.insert(id);
        match index.get(id) {
            None => report.missing_from_index.push(id.to_string()),
            Some(indexed) => {
                if serde_json::to_value(indexed)? != serde_json::to_value(record)? {
                    report.stale_in_index.push(id.to_string());
                }
            }
        }
    }

    for indexed in index.records() {
        if !seen.contains(indexed.record_id()) {
            report.orphaned_in_index.push(indexed.record_id().to_string());
        }
    }

    Ok(())
}
