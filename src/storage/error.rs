//! Storage layer error types
//!
//! All errors that can occur inside the repository engine are defined here.
//! We use `thiserror` for ergonomic error definition and better error messages.

use std::path::PathBuf;

use thiserror::Error;

use crate::storage::types::InvalidNameError;

/// the main error type for repository operations
#[derive(Debug, Error)]
pub enum StorageError {
    /// error from the underlying Git library
    #[error("git error: {0}")]
    Git(#[from] git2::Error),

    /// no repository directory for this producer
    #[error("repo does not exist: {0}")]
    RepoDoesNotExist(String),

    /// the requested branch was not found
    #[error("invalid branch: {0}")]
    InvalidBranch(String),

    /// no file at the requested path in the branch tree
    #[error("file not found: {0}")]
    FileNotFound(String),

    /// a revspec failed to resolve to a commit
    #[error("revision not found: {0}")]
    RevisionNotFound(String),

    /// parent-revision precondition failed
    #[error("optimistic concurrency check failed on branch {branch}")]
    OptimisticConcurrency { branch: String },

    /// another transaction holds the repository lock
    #[error("repository is locked: {0}")]
    Locked(PathBuf),

    /// blob exceeds the single-read size cap
    #[error("file too large: {path} is {size} bytes (limit {limit})")]
    FileTooLarge {
        path: String,
        size: usize,
        limit: usize,
    },

    /// the tree entry at the path is not a blob
    #[error("not a file: {0}")]
    NotABlob(String),

    /// unsupported value type passed to the config writer
    #[error("bad config value for {0}: only strings and integers are supported")]
    BadConfigValue(String),

    /// the requested config key has no value
    #[error("config value not set: {0}")]
    ConfigMissing(String),

    /// invalid producer or branch name
    #[error("invalid name: {0}")]
    InvalidName(#[from] InvalidNameError),

    /// I/O error (filesystem level)
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// internal error that shouldn't happen
    #[error("internal error: {0}")]
    Internal(String),
}

impl StorageError {
    /// check if this error indicates the resource doesn't exist
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            StorageError::RepoDoesNotExist(_)
                | StorageError::InvalidBranch(_)
                | StorageError::FileNotFound(_)
        )
    }

    /// check if this error is recoverable by retry
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            StorageError::OptimisticConcurrency { .. } | StorageError::Locked(_)
        )
    }
}

/// result type alias for storage operations
pub type StorageResult<T> = Result<T, StorageError>;
