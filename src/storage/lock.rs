//! Per-repository transaction lock.
//!
//! Every mutation through the repository facade runs inside a critical
//! section bounded by an OS-level advisory lock on `.git/txn.lock`. The
//! lock is exclusive and cross-process; acquisition is non-blocking so a
//! writer that collides with an in-flight transaction fails fast instead
//! of queueing.
//!
//! The lock file is created lazily and never unlinked. A file left behind
//! by a crashed process is harmless: advisory locks die with the process
//! that held them.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use fs2::FileExt;

use crate::storage::error::{StorageError, StorageResult};

/// name of the sentinel file inside the repository's `.git` directory
pub const LOCK_FILE_NAME: &str = "txn.lock";

/// An exclusive lock on one repository.
///
/// Released when the guard is dropped, on every exit path including panics.
#[derive(Debug)]
pub struct TxnLock {
    path: PathBuf,
    file: Option<std::fs::File>,
}

impl TxnLock {
    /// Attempt to acquire the transaction lock for a repository.
    ///
    /// `git_dir` is the repository's `.git` directory. Returns
    /// [`StorageError::Locked`] immediately if another process holds the
    /// lock; all other acquisition errors propagate as I/O errors.
    pub fn acquire(git_dir: &Path) -> StorageResult<Self> {
        let path = git_dir.join(LOCK_FILE_NAME);

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;

        match file.try_lock_exclusive() {
            Ok(()) => Ok(Self {
                path,
                file: Some(file),
            }),
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                Err(StorageError::Locked(path))
            }
            Err(e) => Err(StorageError::Io(e)),
        }
    }

    /// Run `body` while holding the repository lock.
    ///
    /// The lock is released when `body` returns, whether it succeeded or
    /// not; the body's error is propagated unchanged.
    pub fn with_lock<T, F>(git_dir: &Path, body: F) -> StorageResult<T>
    where
        F: FnOnce() -> StorageResult<T>,
    {
        let _guard = Self::acquire(git_dir)?;
        body()
    }

    /// Path of the sentinel file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TxnLock {
    fn drop(&mut self) {
        if let Some(file) = self.file.take() {
            let _ = file.unlock();
        }
    }
}
