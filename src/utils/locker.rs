//! File-based locking to prevent two processes backing up into one directory

use anyhow::{Context, Result};
use fd_lock::{RwLock, RwLockWriteGuard};
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::debug;

const LOCK_FILE_NAME: &str = ".db-auto-backup.lock";

/// Advisory lock on a backup directory
pub struct RunLock {
    lock: RwLock<File>,
    lock_path: PathBuf,
}

impl RunLock {
    /// Open (creating if needed) the lock file inside `backup_dir`
    pub fn open(backup_dir: &Path) -> Result<Self> {
        let lock_path = backup_dir.join(LOCK_FILE_NAME);

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)
            .with_context(|| format!("Failed to open lock file: {:?}", lock_path))?;

        Ok(Self {
            lock: RwLock::new(file),
            lock_path,
        })
    }

    /// Take the exclusive lock without waiting.
    /// The lock is held until the returned guard is dropped.
    pub fn try_acquire(&mut self) -> Result<RwLockWriteGuard<'_, File>> {
        debug!("Attempting to acquire lock: {:?}", self.lock_path);
        let path = self.lock_path.clone();
        self.lock.try_write().with_context(|| {
            format!(
                "Another backup run holds the lock {:?}; refusing to run concurrently",
                path
            )
        })
    }
}
