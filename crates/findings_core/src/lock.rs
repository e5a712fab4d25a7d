//! Advisory write lock shared by every writer of a store directory.

use crate::error::{FindingsError, Result};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Name of the lock file inside a store directory.
pub const LOCK_FILE_NAME: &str = ".lock";

/// RAII guard for a store's exclusive write lock.
///
/// The lock is released when the guard is dropped. The lock file itself is
/// left in place: unlinking it while another process waits on it would let two
/// writers hold locks on different inodes.
///
/// The lock is advisory. Writers that bypass this crate are not excluded.
pub struct LockGuard {
    file: File,
    path: PathBuf,
}

impl LockGuard {
    /// Blocks until the exclusive lock on `dir/.lock` is held.
    pub fn acquire(dir: &Path) -> Result<Self> {
        let path = dir.join(LOCK_FILE_NAME);
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;

        FileExt::lock_exclusive(&file).map_err(|e| FindingsError::LockFailed {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        debug!(path = %path.display(), "acquired store lock");

        Ok(Self { file, path })
    }

    /// Path of the held lock file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        // Ignore errors: closing the descriptor releases the lock anyway.
        let _ = FileExt::unlock(&self.file);
    }
}
