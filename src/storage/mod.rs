//! Repository engine for the configuration store.
//!
//! This module provides a complete abstraction over Git for configuration
//! storage. The upper layers (REST surface, Smart-HTTP backend) use this
//! API and never touch git2 directly.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        RepoManager                          │
//! │      (discovery and lifecycle under the root directory)     │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        ConfigRepo                           │
//! │   (branches, file reads, config, transactional writes)      │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//!                       ┌─────────────┐
//!                       │   TxnLock   │
//!                       │ (.git/txn.lock, cross-process)        │
//!                       └─────────────┘
//! ```
//!
//! Every change is a commit; every commit hash doubles as an ETag on the
//! REST surface.

mod error;
mod lock;
mod manager;
mod repository;
mod types;

// Re-export public API
pub use error::{StorageError, StorageResult};
pub use lock::TxnLock;
pub use manager::RepoManager;
pub use repository::{ConfigRepo, ACCESS_KEY_CONFIG, MAX_FILE_SIZE};
pub use types::{
    BranchName, CommitId, GitSignature, InvalidNameError, ProducerName, ZERO_REVISION,
};
