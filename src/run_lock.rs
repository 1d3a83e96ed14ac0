//! Exclusive advisory lock held for the duration of an ingest run.

use anyhow::{Context, Result};
use fs4::fs_std::FileExt;
use std::fs::{File, OpenOptions};
use std::path::Path;

/// Releases the ingest lock when dropped.
#[derive(Debug)]
pub struct IngestLockGuard(File);

impl Drop for IngestLockGuard {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.0) {
            log::warn!("Failed to release ingest lock: {e}");
        }
    }
}

fn open_lock_file(lock_path: &Path) -> Result<File> {
    if let Some(parent) = lock_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(lock_path)
        .with_context(|| format!("Failed to open lock file at '{}'", lock_path.display()))
}

/// Block until the lock at `lock_path` is ours.
pub fn acquire(lock_path: &Path) -> Result<IngestLockGuard> {
    let file = open_lock_file(lock_path)?;
    FileExt::lock_exclusive(&file).with_context(|| {
        format!(
            "Failed to acquire exclusive lock at '{}'",
            lock_path.display()
        )
    })?;
    log::debug!("Acquired ingest lock at '{}'", lock_path.display());
    Ok(IngestLockGuard(file))
}

/// Like [`acquire`], but returns `None` immediately if another run holds the lock.
pub fn try_acquire(lock_path: &Path) -> Result<Option<IngestLockGuard>> {
    let file = open_lock_file(lock_path)?;
    match FileExt::try_lock_exclusive(&file) {
        Ok(true) => Ok(Some(IngestLockGuard(file))),
        Ok(false) => Ok(None),
        Err(e) => Err(e).with_context(|| format!("Failed to lock '{}'", lock_path.display())),
    }
}

/// Take the lock, logging when another run makes us wait.
pub fn acquire_or_wait(lock_path: &Path) -> Result<IngestLockGuard> {
    if let Some(guard) = try_acquire(lock_path)? {
        return Ok(guard);
    }
    log::info!(
        "Another ingest run holds '{}', waiting for it to finish",
        lock_path.display()
    );
    acquire(lock_path)
}
