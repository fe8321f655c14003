//! File-based locking for trash operations.
//!
//! This provides cross-process mutual exclusion for operations that move
//! branches in and out of the trash namespace. Two processes interleaving
//! the steps of a trash and a restore on the same name could otherwise
//! leave the branch duplicated or lost.

use anyhow::{Context, Result};
use fs2::FileExt;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

/// Lock file name within .git/branchbin/
const LOCK_FILE: &str = "lock";

/// Guard that holds an exclusive lock on the trash store.
///
/// The lock is automatically released when this guard is dropped.
#[derive(Debug)]
pub struct TrashLockGuard {
    _file: File, // Held to keep the lock active
}

impl TrashLockGuard {
    /// Acquire an exclusive lock for a given git directory.
    ///
    /// Blocks until the lock can be acquired.
    pub fn acquire(git_dir: &Path) -> Result<Self> {
        let file = Self::open_lock_file(git_dir)?;

        // Acquire exclusive lock (blocks until available)
        file.lock_exclusive()
            .context("Failed to acquire exclusive lock on trash store")?;

        Ok(Self { _file: file })
    }

    /// Try to acquire an exclusive lock without blocking.
    ///
    /// Returns `Ok(None)` if the lock is held elsewhere.
    pub fn try_acquire(git_dir: &Path) -> Result<Option<Self>> {
        let file = Self::open_lock_file(git_dir)?;

        match file.try_lock_exclusive() {
            Ok(()) => Ok(Some(Self { _file: file })),
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(e).context("Failed to acquire lock on trash store"),
        }
    }

    fn open_lock_file(git_dir: &Path) -> Result<File> {
        let lock_path = Self::lock_path_for_git_dir(git_dir);

        // Ensure parent directory exists
        if let Some(parent) = lock_path.parent() {
            fs::create_dir_all(parent).context("Failed to create branchbin directory")?;
        }

        File::create(&lock_path).context("Failed to create lock file")
    }

    pub(crate) fn lock_path_for_git_dir(git_dir: &Path) -> PathBuf {
        git_dir.join("branchbin").join(LOCK_FILE)
    }
}

// Lock is released when file is dropped (fs2 handles this)
