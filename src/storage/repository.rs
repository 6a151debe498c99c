//! Core Git repository facade.
//!
//! This is the central component of the repository engine. It wraps
//! `git2::Repository` with thread-safe access and provides the object-level
//! operations the REST surface uses: branch listing and movement, file
//! reads, repository config, and the transactional multi-file write.
//!
//! Every mutating operation first takes the cross-process [`TxnLock`] on
//! the repository, then the in-process handle lock. Readers only take the
//! handle lock.

use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use git2::build::CheckoutBuilder;
use git2::{BranchType, ErrorCode, IndexAddOption, ObjectType, Repository, StatusOptions};
use parking_lot::RwLock;
use serde_json::Value;
use tracing::debug;

use crate::storage::error::{StorageError, StorageResult};
use crate::storage::lock::TxnLock;
use crate::storage::types::{BranchName, CommitId, GitSignature};

/// single-blob read cap; larger files fail with a typed error
pub const MAX_FILE_SIZE: usize = 1024 * 1024;

/// git config key holding the per-repo shared secret for Smart-HTTP auth
pub const ACCESS_KEY_CONFIG: &str = "lunchbadger.accesskey";

/// commit message used for every write transaction
const COMMIT_MESSAGE: &str = "Changes";

/// The main Git repository facade.
///
/// Clone this to share across threads - it uses Arc internally.
#[derive(Clone)]
pub struct ConfigRepo {
    inner: Arc<ConfigRepoInner>,
}

struct ConfigRepoInner {
    repo: RwLock<Repository>,
    path: PathBuf,
    git_dir: PathBuf,
    signature: GitSignature,
}

impl ConfigRepo {
    /// Open an existing repository.
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref();
        let repo = Repository::open(path)?;
        let git_dir = repo.path().to_path_buf();

        Ok(Self {
            inner: Arc::new(ConfigRepoInner {
                repo: RwLock::new(repo),
                path: path.to_path_buf(),
                git_dir,
                signature: GitSignature::service(),
            }),
        })
    }

    /// Working-tree directory of the repository.
    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// The `.git` directory, where the transaction lock lives.
    pub fn git_dir(&self) -> &Path {
        &self.inner.git_dir
    }

    /// Execute a function with read access to the repository.
    fn with_repo<F, T>(&self, f: F) -> StorageResult<T>
    where
        F: FnOnce(&Repository) -> StorageResult<T>,
    {
        let repo = self.inner.repo.read();
        f(&repo)
    }

    /// Execute a function with write access to the repository.
    fn with_repo_mut<F, T>(&self, f: F) -> StorageResult<T>
    where
        F: FnOnce(&Repository) -> StorageResult<T>,
    {
        let repo = self.inner.repo.write();
        f(&repo)
    }

    /// Execute a mutation inside the cross-process transaction lock.
    fn with_txn<F, T>(&self, f: F) -> StorageResult<T>
    where
        F: FnOnce(&Repository) -> StorageResult<T>,
    {
        TxnLock::with_lock(&self.inner.git_dir, || self.with_repo_mut(f))
    }

    // ==================== Branch Operations ====================

    /// List all local branch names.
    pub fn branches(&self) -> StorageResult<Vec<BranchName>> {
        self.with_repo(|repo| {
            let mut result = Vec::new();
            for branch in repo.branches(Some(BranchType::Local))? {
                let (branch, _) = branch?;
                if let Some(name) = branch.name()? {
                    if let Ok(branch_name) = BranchName::new(name) {
                        result.push(branch_name);
                    }
                }
            }
            result.sort_by(|a, b| a.as_str().cmp(b.as_str()));
            Ok(result)
        })
    }

    /// Commit hash a branch currently points at.
    pub fn branch_revision(&self, branch: &BranchName) -> StorageResult<CommitId> {
        self.with_repo(|repo| resolve_branch(repo, branch))
    }

    /// Map of branch name to commit hash for every local branch.
    pub fn branch_heads(&self) -> StorageResult<Vec<(BranchName, CommitId)>> {
        let mut heads = Vec::new();
        for branch in self.branches()? {
            let revision = self.branch_revision(&branch)?;
            heads.push((branch, revision));
        }
        Ok(heads)
    }

    /// Create the branch at `revspec`, or force-move it if it exists.
    ///
    /// `revspec` may be a branch name, a commit hash or prefix, or any
    /// valid Git revspec; resolution failure is [`StorageError::RevisionNotFound`].
    /// Returns the resolved commit hash.
    pub fn upsert_branch(&self, branch: &BranchName, revspec: &str) -> StorageResult<CommitId> {
        self.with_txn(|repo| {
            let target = repo
                .revparse_single(revspec)
                .and_then(|obj| obj.peel(ObjectType::Commit))
                .map_err(|_| StorageError::RevisionNotFound(revspec.to_string()))?
                .id();

            let ref_path = branch.as_ref_path();
            match repo.find_reference(&ref_path) {
                Ok(mut reference) => {
                    reference.set_target(target, &format!("force-move to {}", target))?;
                }
                Err(e) if e.code() == ErrorCode::NotFound => {
                    repo.reference(&ref_path, target, false, "create branch")?;
                }
                Err(e) => return Err(e.into()),
            }

            Ok(CommitId::new(target))
        })
    }

    /// Delete a branch, detaching HEAD first when it points at the branch.
    pub fn delete_branch(&self, branch: &BranchName) -> StorageResult<()> {
        self.with_txn(|repo| {
            let ref_path = branch.as_ref_path();
            let mut reference = repo
                .find_reference(&ref_path)
                .map_err(|_| StorageError::InvalidBranch(branch.to_string()))?;

            let head = repo.find_reference("HEAD")?;
            if head.symbolic_target() == Some(ref_path.as_str()) {
                let commit = reference.peel_to_commit()?;
                repo.set_head_detached(commit.id())?;
            }

            reference.delete()?;
            Ok(())
        })
    }

    // ==================== File Operations ====================

    /// Read a file from a branch's tree.
    ///
    /// Returns the blob content and the commit hash of the branch head it
    /// was read from, which the REST surface uses as the ETag. Non-blob
    /// entries and blobs over [`MAX_FILE_SIZE`] are typed failures.
    pub fn get_file(&self, branch: &BranchName, path: &str) -> StorageResult<(Vec<u8>, CommitId)> {
        self.with_repo(|repo| {
            let reference = repo
                .find_reference(&branch.as_ref_path())
                .map_err(|_| StorageError::InvalidBranch(branch.to_string()))?;
            let commit = reference.peel_to_commit()?;
            let tree = commit.tree()?;

            let entry = tree.get_path(Path::new(path)).map_err(|e| {
                if e.code() == ErrorCode::NotFound {
                    StorageError::FileNotFound(path.to_string())
                } else {
                    StorageError::Git(e)
                }
            })?;

            if entry.kind() != Some(ObjectType::Blob) {
                return Err(StorageError::NotABlob(path.to_string()));
            }

            let blob = repo.find_blob(entry.id())?;
            if blob.size() > MAX_FILE_SIZE {
                return Err(StorageError::FileTooLarge {
                    path: path.to_string(),
                    size: blob.size(),
                    limit: MAX_FILE_SIZE,
                });
            }

            Ok((blob.content().to_vec(), CommitId::new(commit.id())))
        })
    }

    // ==================== Config Operations ====================

    /// Write key/value pairs to the repository config.
    ///
    /// Only string and integer values are supported; anything else fails
    /// with [`StorageError::BadConfigValue`].
    pub fn config_set(&self, values: &serde_json::Map<String, Value>) -> StorageResult<()> {
        self.with_txn(|repo| {
            let mut config = repo.config()?;
            for (key, value) in values {
                match value {
                    Value::String(s) => config.set_str(key, s)?,
                    Value::Number(n) => match n.as_i64() {
                        Some(i) => config.set_i64(key, i)?,
                        None => return Err(StorageError::BadConfigValue(key.clone())),
                    },
                    _ => return Err(StorageError::BadConfigValue(key.clone())),
                }
            }
            Ok(())
        })
    }

    /// Read a string config value. Missing keys are classified by the
    /// underlying error code, not by message inspection.
    pub fn config_get(&self, name: &str) -> StorageResult<String> {
        self.with_repo(|repo| {
            let config = repo.config()?;
            config.get_string(name).map_err(|e| {
                if e.code() == ErrorCode::NotFound {
                    StorageError::ConfigMissing(name.to_string())
                } else {
                    StorageError::Git(e)
                }
            })
        })
    }

    /// The repository's Smart-HTTP shared secret.
    pub fn access_key(&self) -> StorageResult<String> {
        self.config_get(ACCESS_KEY_CONFIG)
    }

    /// Replace the shared secret with a fresh one and return it.
    pub fn regenerate_access_key(&self) -> StorageResult<String> {
        let key = ulid::Ulid::new().to_string().to_lowercase();
        self.with_txn(|repo| {
            let mut config = repo.config()?;
            config.set_str(ACCESS_KEY_CONFIG, &key)?;
            Ok(())
        })?;
        Ok(key)
    }

    // ==================== Transactional Write ====================

    /// Materialize `files` on `branch` and commit them in one transaction.
    ///
    /// `parent_revision` is the caller's optimistic-concurrency assertion:
    /// a commit hash (full or prefix) the branch head must still equal. A
    /// write whose files already match the tree creates no commit and
    /// echoes the current head. Returns the commit hash that the branch
    /// points at afterwards.
    pub fn update_branch_files(
        &self,
        branch: &BranchName,
        parent_revision: Option<&str>,
        files: &[(String, Vec<u8>)],
    ) -> StorageResult<CommitId> {
        for (path, _) in files {
            validate_worktree_path(path)?;
        }

        self.with_txn(|repo| {
            // Step 1: open or initialize HEAD on the target branch.
            let head_commit = checkout_branch(repo, branch)?;

            // Step 2: optimistic concurrency check.
            let parent_ids = match (&parent_revision, &head_commit) {
                (Some(rev), Some(head)) => {
                    let resolved = repo
                        .revparse_single(rev)
                        .and_then(|obj| obj.peel(ObjectType::Commit))
                        .map_err(|_| StorageError::OptimisticConcurrency {
                            branch: branch.to_string(),
                        })?
                        .id();
                    if resolved != head.raw() {
                        return Err(StorageError::OptimisticConcurrency {
                            branch: branch.to_string(),
                        });
                    }
                    vec![*head]
                }
                (Some(rev), None) => {
                    return Err(StorageError::Internal(format!(
                        "parent revision {} asserted on empty branch {}",
                        rev, branch
                    )));
                }
                (None, Some(_)) => {
                    return Err(StorageError::OptimisticConcurrency {
                        branch: branch.to_string(),
                    });
                }
                (None, None) => Vec::new(),
            };

            // Step 3: materialize files in the working tree.
            let workdir = repo
                .workdir()
                .ok_or_else(|| StorageError::Internal("repository has no working tree".into()))?
                .to_path_buf();
            for (path, content) in files {
                let dest = workdir.join(path);
                if let Some(parent) = dest.parent() {
                    fs::create_dir_all(parent)?;
                }
                fs::write(&dest, content)?;
            }

            // Step 4: no-op writes create no commit.
            let mut status_opts = StatusOptions::new();
            status_opts
                .include_untracked(true)
                .recurse_untracked_dirs(true);
            let statuses = repo.statuses(Some(&mut status_opts))?;
            if statuses.is_empty() {
                if let Some(head) = head_commit {
                    debug!(branch = %branch, "no changes detected, echoing parent revision");
                    return Ok(head);
                }
            }

            // Step 5: stage everything and commit.
            let mut index = repo.index()?;
            index.add_all(["*"].iter(), IndexAddOption::DEFAULT, None)?;
            index.write()?;
            let tree_id = index.write_tree()?;
            let tree = repo.find_tree(tree_id)?;

            let sig = self.inner.signature.to_git2_signature()?;
            let parents: Vec<git2::Commit<'_>> = parent_ids
                .iter()
                .map(|id| repo.find_commit(id.raw()))
                .collect::<Result<_, _>>()?;
            let parent_refs: Vec<&git2::Commit<'_>> = parents.iter().collect();

            let oid = repo.commit(Some("HEAD"), &sig, &sig, COMMIT_MESSAGE, &tree, &parent_refs)?;
            debug!(branch = %branch, commit = %oid, "transaction committed");

            Ok(CommitId::new(oid))
        })
    }
}

/// Resolve a branch to its head commit.
fn resolve_branch(repo: &Repository, branch: &BranchName) -> StorageResult<CommitId> {
    let reference = repo
        .find_reference(&branch.as_ref_path())
        .map_err(|_| StorageError::InvalidBranch(branch.to_string()))?;
    let commit = reference
        .peel_to_commit()
        .map_err(|_| StorageError::InvalidBranch(branch.to_string()))?;
    Ok(CommitId::new(commit.id()))
}

/// Point HEAD at `branch` and sync the working tree to it.
///
/// On an unborn HEAD the branch becomes the symbolic target and `None` is
/// returned: the next commit will be the branch's initial commit. A missing
/// branch on a non-empty repository is `InvalidBranch`.
fn checkout_branch(repo: &Repository, branch: &BranchName) -> StorageResult<Option<CommitId>> {
    match repo.head() {
        Err(e) if matches!(e.code(), ErrorCode::UnbornBranch | ErrorCode::NotFound) => {
            repo.set_head(&branch.as_ref_path())?;
            Ok(None)
        }
        Ok(_) => {
            if repo.find_reference(&branch.as_ref_path()).is_err() {
                return Err(StorageError::InvalidBranch(branch.to_string()));
            }
            repo.set_head(&branch.as_ref_path())?;
            let mut checkout = CheckoutBuilder::new();
            // leftovers from aborted transactions must not leak into this one
            checkout.force().remove_untracked(true);
            repo.checkout_head(Some(&mut checkout))?;
            let head = repo.head()?.peel_to_commit()?;
            Ok(Some(CommitId::new(head.id())))
        }
        Err(e) => Err(e.into()),
    }
}

/// Reject paths that would escape the working tree.
fn validate_worktree_path(path: &str) -> StorageResult<()> {
    let p = Path::new(path);
    let escapes = p.components().any(|c| {
        matches!(
            c,
            Component::ParentDir | Component::RootDir | Component::Prefix(_)
        )
    });
    if path.is_empty() || escapes {
        return Err(StorageError::InvalidName(
            crate::storage::types::InvalidNameError::InvalidPath(path.to_string()),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::manager::RepoManager;
    use crate::storage::types::ProducerName;
    use tempfile::TempDir;

    fn setup() -> (TempDir, ConfigRepo) {
        let dir = TempDir::new().unwrap();
        let manager = RepoManager::new(dir.path()).unwrap();
        let repo = manager.create(&ProducerName::new("acme").unwrap()).unwrap();
        (dir, repo)
    }

    fn dev() -> BranchName {
        BranchName::for_env("dev").unwrap()
    }

    fn files(pairs: &[(&str, &str)]) -> Vec<(String, Vec<u8>)> {
        pairs
            .iter()
            .map(|(p, c)| (p.to_string(), c.as_bytes().to_vec()))
            .collect()
    }

    #[test]
    fn test_initial_write_creates_branch() {
        let (_dir, repo) = setup();

        let rev = repo
            .update_branch_files(&dev(), None, &files(&[("a", "1"), ("b", "2")]))
            .unwrap();

        // invariant: branch revision equals the returned ETag
        assert_eq!(repo.branch_revision(&dev()).unwrap(), rev);

        let (content, read_rev) = repo.get_file(&dev(), "a").unwrap();
        assert_eq!(content, b"1");
        assert_eq!(read_rev, rev);
    }

    #[test]
    fn test_noop_write_echoes_parent() {
        let (_dir, repo) = setup();

        let h1 = repo
            .update_branch_files(&dev(), None, &files(&[("a", "1")]))
            .unwrap();

        // same content, correct parent: no new commit
        let h1_again = repo
            .update_branch_files(&dev(), Some(&h1.to_hex()), &files(&[("a", "1")]))
            .unwrap();
        assert_eq!(h1_again, h1);
        assert_eq!(repo.branch_revision(&dev()).unwrap(), h1);

        // changed content advances the branch
        let h2 = repo
            .update_branch_files(&dev(), Some(&h1.to_hex()), &files(&[("a", "9")]))
            .unwrap();
        assert_ne!(h2, h1);
        assert_eq!(repo.branch_revision(&dev()).unwrap(), h2);
    }

    #[test]
    fn test_stale_parent_is_rejected_and_repo_unchanged() {
        let (_dir, repo) = setup();

        let h1 = repo
            .update_branch_files(&dev(), None, &files(&[("a", "1")]))
            .unwrap();
        let h2 = repo
            .update_branch_files(&dev(), Some(&h1.to_hex()), &files(&[("a", "9")]))
            .unwrap();

        let result = repo.update_branch_files(&dev(), Some(&h1.to_hex()), &files(&[("a", "x")]));
        assert!(matches!(
            result,
            Err(StorageError::OptimisticConcurrency { .. })
        ));

        assert_eq!(repo.branch_revision(&dev()).unwrap(), h2);
        let (content, _) = repo.get_file(&dev(), "a").unwrap();
        assert_eq!(content, b"9");
    }

    #[test]
    fn test_parent_accepts_hash_prefix() {
        let (_dir, repo) = setup();

        let h1 = repo
            .update_branch_files(&dev(), None, &files(&[("a", "1")]))
            .unwrap();
        let h2 = repo
            .update_branch_files(&dev(), Some(&h1.short()), &files(&[("a", "2")]))
            .unwrap();
        assert_ne!(h2, h1);
    }

    #[test]
    fn test_garbage_parent_is_concurrency_failure() {
        let (_dir, repo) = setup();
        repo.update_branch_files(&dev(), None, &files(&[("a", "1")]))
            .unwrap();

        let result =
            repo.update_branch_files(&dev(), Some("not-a-revision"), &files(&[("a", "2")]));
        assert!(matches!(
            result,
            Err(StorageError::OptimisticConcurrency { .. })
        ));
    }

    #[test]
    fn test_missing_parent_on_nonempty_branch() {
        let (_dir, repo) = setup();
        repo.update_branch_files(&dev(), None, &files(&[("a", "1")]))
            .unwrap();

        let result = repo.update_branch_files(&dev(), None, &files(&[("a", "2")]));
        assert!(matches!(
            result,
            Err(StorageError::OptimisticConcurrency { .. })
        ));
    }

    #[test]
    fn test_parent_on_empty_branch_is_generic_error() {
        let (_dir, repo) = setup();
        let result = repo.update_branch_files(
            &dev(),
            Some("deadbeefdeadbeefdeadbeefdeadbeefdeadbeef"),
            &files(&[("a", "1")]),
        );
        assert!(matches!(result, Err(StorageError::Internal(_))));
    }

    #[test]
    fn test_write_to_unknown_branch_fails() {
        let (_dir, repo) = setup();
        repo.update_branch_files(&dev(), None, &files(&[("a", "1")]))
            .unwrap();

        let stage = BranchName::for_env("stage").unwrap();
        let result = repo.update_branch_files(&stage, None, &files(&[("a", "1")]));
        assert!(matches!(result, Err(StorageError::InvalidBranch(_))));
    }

    #[test]
    fn test_nested_paths_materialize() {
        let (_dir, repo) = setup();
        let rev = repo
            .update_branch_files(&dev(), None, &files(&[("gateways/main/policies", "p")]))
            .unwrap();

        let (content, read_rev) = repo.get_file(&dev(), "gateways/main/policies").unwrap();
        assert_eq!(content, b"p");
        assert_eq!(read_rev, rev);
    }

    #[test]
    fn test_path_escape_rejected() {
        let (_dir, repo) = setup();
        let result = repo.update_branch_files(&dev(), None, &files(&[("../evil", "x")]));
        assert!(matches!(result, Err(StorageError::InvalidName(_))));

        let result = repo.update_branch_files(&dev(), None, &files(&[("/abs", "x")]));
        assert!(matches!(result, Err(StorageError::InvalidName(_))));
    }

    #[test]
    fn test_get_file_errors() {
        let (_dir, repo) = setup();
        repo.update_branch_files(&dev(), None, &files(&[("sub/leaf", "1")]))
            .unwrap();

        let ghost = BranchName::for_env("ghost").unwrap();
        assert!(matches!(
            repo.get_file(&ghost, "sub/leaf"),
            Err(StorageError::InvalidBranch(_))
        ));
        assert!(matches!(
            repo.get_file(&dev(), "missing"),
            Err(StorageError::FileNotFound(_))
        ));
        // a directory entry is not a blob
        assert!(matches!(
            repo.get_file(&dev(), "sub"),
            Err(StorageError::NotABlob(_))
        ));
    }

    #[test]
    fn test_get_file_size_cap() {
        let (_dir, repo) = setup();
        let big = vec![b'x'; MAX_FILE_SIZE + 1];
        repo.update_branch_files(&dev(), None, &[("big".to_string(), big)])
            .unwrap();

        let result = repo.get_file(&dev(), "big");
        assert!(matches!(result, Err(StorageError::FileTooLarge { .. })));
    }

    #[test]
    fn test_upsert_branch_from_branch_name() {
        let (_dir, repo) = setup();
        let h = repo
            .update_branch_files(&dev(), None, &files(&[("a", "9")]))
            .unwrap();

        let copy = BranchName::for_env("copy").unwrap();
        let resolved = repo.upsert_branch(&copy, "env/dev").unwrap();
        assert_eq!(resolved, h);
        assert_eq!(repo.branch_revision(&copy).unwrap(), h);

        let (content, _) = repo.get_file(&copy, "a").unwrap();
        assert_eq!(content, b"9");
    }

    #[test]
    fn test_upsert_branch_force_moves() {
        let (_dir, repo) = setup();
        let h1 = repo
            .update_branch_files(&dev(), None, &files(&[("a", "1")]))
            .unwrap();
        let h2 = repo
            .update_branch_files(&dev(), Some(&h1.to_hex()), &files(&[("a", "2")]))
            .unwrap();

        let pin = BranchName::for_env("pin").unwrap();
        repo.upsert_branch(&pin, &h2.to_hex()).unwrap();
        let moved = repo.upsert_branch(&pin, &h1.to_hex()).unwrap();
        assert_eq!(moved, h1);
        assert_eq!(repo.branch_revision(&pin).unwrap(), h1);
    }

    #[test]
    fn test_upsert_branch_unknown_revision() {
        let (_dir, repo) = setup();
        let pin = BranchName::for_env("pin").unwrap();
        let result = repo.upsert_branch(&pin, "no-such-revspec");
        assert!(matches!(result, Err(StorageError::RevisionNotFound(_))));
    }

    #[test]
    fn test_delete_branch_detaches_head() {
        let (_dir, repo) = setup();
        repo.update_branch_files(&dev(), None, &files(&[("a", "1")]))
            .unwrap();

        // dev is the checked-out branch at this point
        repo.delete_branch(&dev()).unwrap();
        assert!(matches!(
            repo.branch_revision(&dev()),
            Err(StorageError::InvalidBranch(_))
        ));
    }

    #[test]
    fn test_delete_missing_branch() {
        let (_dir, repo) = setup();
        let result = repo.delete_branch(&dev());
        assert!(matches!(result, Err(StorageError::InvalidBranch(_))));
    }

    #[test]
    fn test_branches_listing() {
        let (_dir, repo) = setup();
        assert!(repo.branches().unwrap().is_empty());

        repo.update_branch_files(&dev(), None, &files(&[("a", "1")]))
            .unwrap();
        let stage = BranchName::for_env("stage").unwrap();
        repo.upsert_branch(&stage, "env/dev").unwrap();

        let names: Vec<String> = repo
            .branches()
            .unwrap()
            .into_iter()
            .map(|b| b.as_str().to_string())
            .collect();
        assert_eq!(names, vec!["env/dev", "env/stage"]);
    }

    #[test]
    fn test_config_roundtrip() {
        let (_dir, repo) = setup();

        let mut values = serde_json::Map::new();
        values.insert("custom.name".into(), Value::String("alpha".into()));
        values.insert("custom.count".into(), Value::Number(7.into()));
        repo.config_set(&values).unwrap();

        assert_eq!(repo.config_get("custom.name").unwrap(), "alpha");
        assert_eq!(repo.config_get("custom.count").unwrap(), "7");
    }

    #[test]
    fn test_config_rejects_other_types() {
        let (_dir, repo) = setup();
        let mut values = serde_json::Map::new();
        values.insert("custom.flag".into(), Value::Bool(true));

        let result = repo.config_set(&values);
        assert!(matches!(result, Err(StorageError::BadConfigValue(_))));
    }

    #[test]
    fn test_config_missing_key() {
        let (_dir, repo) = setup();
        let result = repo.config_get("lunchbadger.nope");
        assert!(matches!(result, Err(StorageError::ConfigMissing(_))));
    }

    #[test]
    fn test_regenerate_access_key() {
        let (_dir, repo) = setup();
        let original = repo.access_key().unwrap();
        let fresh = repo.regenerate_access_key().unwrap();
        assert_ne!(fresh, original);
        assert_eq!(repo.access_key().unwrap(), fresh);
    }

    #[test]
    fn test_locked_repo_rejects_writer() {
        let (_dir, repo) = setup();
        let _guard = TxnLock::acquire(repo.git_dir()).unwrap();

        let result = repo.update_branch_files(&dev(), None, &files(&[("a", "1")]));
        assert!(matches!(result, Err(StorageError::Locked(_))));
    }
}
