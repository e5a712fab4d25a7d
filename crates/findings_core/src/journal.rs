//! Log + index pair shared by the local and global stores.
//!
//! A [`Journal`] owns one [`RecordLog`] and lazily loads the [`RecordIndex`]
//! derived from it. Every mutation goes through [`Journal::transact`], which
//! requires the store's [`LockGuard`] as proof that no other writer is active:
//!
//! 1. refresh the cached index if the log grew since it was loaded,
//! 2. let the caller compute the next snapshot from the current index,
//! 3. append that snapshot to the log (failure is fatal),
//! 4. upsert it into the index and persist the index (failure only warns).
//!
//! The index on disk is disposable. Missing, corrupt, or stale index files are
//! rebuilt from the log on load.

use crate::clock::Clock;
use crate::error::Result;
use crate::index::RecordIndex;
use crate::lock::LockGuard;
use crate::log::{CompactReport, LogRecord, RecordLog};
use crate::verify::{self, VerifyReport};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Name of the index file inside a store directory.
pub const INDEX_FILE_NAME: &str = "index.json";

/// Report from a forced index rebuild.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RebuildReport {
    /// Non-blank lines replayed.
    pub log_lines: usize,
    /// Distinct records now indexed.
    pub records: usize,
    /// 1-based numbers of lines skipped as corrupt.
    pub corrupt_lines: Vec<usize>,
}

/// Append-only log with its derived, lazily loaded index.
pub struct Journal<R> {
    dir: PathBuf,
    log: RecordLog,
    index_path: PathBuf,
    index: Option<RecordIndex<R>>,
    clock: Clock,
}

impl<R: LogRecord> Journal<R> {
    /// Creates a journal over `dir/log_file_name` and `dir/index.json`.
    ///
    /// Nothing is read until the index is first needed.
    pub(crate) fn new(dir: &Path, log_file_name: &str, clock: Clock) -> Self {
        Self {
            dir: dir.to_path_buf(),
            log: RecordLog::new(dir.join(log_file_name)),
            index_path: dir.join(INDEX_FILE_NAME),
            index: None,
            clock,
        }
    }

    pub(crate) fn set_clock(&mut self, clock: Clock) {
        self.clock = clock;
    }

    /// Directory holding the log, index and lock file.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// The underlying log.
    pub fn log(&self) -> &RecordLog {
        &self.log
    }

    /// Path of the persisted index.
    pub fn index_path(&self) -> &Path {
        &self.index_path
    }

    /// Takes the store's exclusive write lock, blocking until it is free.
    pub fn lock(&self) -> Result<LockGuard> {
        LockGuard::acquire(&self.dir)
    }

    /// Returns the index, loading it on first access.
    pub fn index(&mut self) -> Result<&RecordIndex<R>> {
        let index = match self.index.take() {
            Some(index) => index,
            None => self.load()?,
        };
        Ok(self.index.insert(index))
    }

    /// Drops the cached index and loads it again from disk.
    pub fn reload(&mut self) -> Result<&RecordIndex<R>> {
        self.index = None;
        self.index()
    }

    /// Replays the whole log into a fresh index, ignoring any cached file.
    pub fn rebuild(&mut self, _guard: &LockGuard) -> Result<RebuildReport> {
        let replay = self.log.replay::<R>()?;
        let index = RecordIndex::from_replay(&replay, self.clock.timestamp());
        index.persist(&self.index_path)?;

        let report = RebuildReport {
            log_lines: replay.total_lines,
            records: index.len(),
            corrupt_lines: replay.corrupt_lines,
        };
        info!(
            path = %self.log.path().display(),
            records = report.records,
            corrupt = report.corrupt_lines.len(),
            "rebuilt index"
        );

        self.index = Some(index);
        Ok(report)
    }

    /// Runs one read-modify-append step under the store lock.
    ///
    /// `f` sees the freshest index and the current timestamp. Returning
    /// `Ok(None)` writes nothing. The appended snapshot is returned.
    ///
    /// # Errors
    ///
    /// Errors from `f` and any failure to append to the log. A failure to
    /// persist the index afterwards is logged only; the next load rebuilds it.
    pub fn transact<F>(&mut self, _guard: &LockGuard, f: F) -> Result<Option<R>>
    where
        F: FnOnce(&RecordIndex<R>, &str) -> Result<Option<R>>,
    {
        let log_bytes = self.log.len_bytes()?;
        let mut index = match self.index.take() {
            Some(index) if index.reflects_log(log_bytes) => index,
            Some(_) => {
                debug!(path = %self.log.path().display(), "log changed since load, refreshing index");
                self.load()?
            }
            None => self.load()?,
        };

        let now = self.clock.timestamp();
        let outcome = self.apply(&mut index, f, &now);
        self.index = Some(index);
        outcome
    }

    fn apply<F>(&self, index: &mut RecordIndex<R>, f: F, now: &str) -> Result<Option<R>>
    where
        F: FnOnce(&RecordIndex<R>, &str) -> Result<Option<R>>,
    {
        let Some(record) = f(index, now)? else {
            return Ok(None);
        };

        let log_bytes = self.log.append(&record)?;
        index.upsert(record.clone());
        index.set_log_bytes(log_bytes);

        if let Err(e) = index.persist(&self.index_path) {
            warn!(path = %self.index_path.display(), error = %e, "failed to persist index");
        }

        Ok(Some(record))
    }

    /// Reduces the log to the latest snapshot per id, then re-indexes it.
    ///
    /// A dry run (`apply == false`) only reports.
    pub fn compact(&mut self, guard: &LockGuard, apply: bool) -> Result<CompactReport> {
        let report = self.log.compact::<R>(apply)?;
        if report.applied {
            self.rebuild(guard)?;
        }
        Ok(report)
    }

    /// Compares the persisted index with a replay of the log.
    pub fn verify(&self) -> Result<VerifyReport> {
        verify::verify::<R>(&self.log, &self.index_path)
    }

    fn load(&self) -> Result<RecordIndex<R>> {
        let log_bytes = self.log.len_bytes()?;

        if let Some(index) = RecordIndex::read(&self.index_path) {
            if index.reflects_log(log_bytes) {
                debug!(path = %self.index_path.display(), records = index.len(), "loaded index");
                return Ok(index);
            }
            info!(path = %self.index_path.display(), "index is stale, rebuilding from log");
        }

        let replay = self.log.replay::<R>()?;
        let index = RecordIndex::from_replay(&replay, self.clock.timestamp());
        if let Err(e) = index.persist(&self.index_path) {
            warn!(path = %self.index_path.display(), error = %e, "failed to persist rebuilt index");
        }
        Ok(index)
    }
}
