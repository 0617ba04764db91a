//! Exclusive ownership of a store directory
//!
//! Uses `fs2` advisory locks (flock on Unix, LockFile on Windows). The lock
//! belongs to the open file handle, so it is released when the owning
//! process exits, even after a crash.

use crate::error::{Error, Result};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Lock file name inside the store directory
pub const LOCK_FILE: &str = "LOCK";

/// Exclusive lock on a store directory, held until dropped
#[derive(Debug)]
pub struct StoreLock {
    /// Kept open to keep the lock
    file: File,
    path: PathBuf,
}

impl StoreLock {
    /// Take the lock without waiting
    ///
    /// Fails with `StoreUnavailable` if another handle, in this process or
    /// any other, already owns the directory.
    pub fn acquire(dir: &Path) -> Result<Self> {
        let path = dir.join(LOCK_FILE);

        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|e| Error::StoreUnavailable(format!("Failed to create lock file: {}", e)))?;

        if let Err(e) = file.try_lock_exclusive() {
            let holder = std::fs::read_to_string(&path).unwrap_or_default();
            let holder = holder.trim();
            return Err(Error::StoreUnavailable(if holder.is_empty() {
                format!("Store {} is already in use: {}", dir.display(), e)
            } else {
                format!("Store {} is already in use by process {}", dir.display(), holder)
            }));
        }

        // Only the holder rewrites the pid
        file.set_len(0)
            .and_then(|()| writeln!(file, "{}", std::process::id()))
            .and_then(|()| file.sync_all())
            .map_err(|e| Error::StoreUnavailable(format!("Failed to write lock file: {}", e)))?;

        debug!(path = ?path, "Acquired store lock");
        Ok(Self { file, path })
    }
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        // The file stays behind: removing it would race with the next opener
        let _ = FileExt::unlock(&self.file);
        debug!(path = ?self.path, "Released store lock");
    }
}
