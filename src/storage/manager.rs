//! Repository discovery and lifecycle under a root directory.
//!
//! The root contains one directory per producer, named `<producer>.git`.
//! Anything else in the root is ignored. The manager owns discovery and
//! creation; it hands out freshly opened [`ConfigRepo`] facades and never
//! caches Git handles across requests.

use std::fs;
use std::path::{Path, PathBuf};

use git2::Repository;
use tracing::info;

use crate::storage::error::{StorageError, StorageResult};
use crate::storage::repository::ConfigRepo;
use crate::storage::types::ProducerName;

/// shell body of the post-receive hook; copies the receive-pack report from
/// stdin into the server-bound stdout stream where the pkt-line tee reads it
const POST_RECEIVE_HOOK: &str = "#!/bin/bash\nexec cat\n";

/// Discovers, creates, opens and deletes repositories under a root directory.
#[derive(Debug, Clone)]
pub struct RepoManager {
    root: PathBuf,
}

impl RepoManager {
    /// Create a manager over `root`, creating the directory if needed.
    pub fn new(root: impl Into<PathBuf>) -> StorageResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// The root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory path for a producer's repository.
    pub fn path(&self, name: &ProducerName) -> PathBuf {
        self.root.join(name.dir_name())
    }

    /// Whether the repository directory exists. Does not validate Git contents.
    pub fn exists(&self, name: &ProducerName) -> bool {
        self.path(name).is_dir()
    }

    /// List all repositories under the root, sorted by name.
    ///
    /// A child counts as a repository iff it is a directory whose name ends
    /// in `.git`.
    pub fn list(&self) -> StorageResult<Vec<ProducerName>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let file_name = entry.file_name();
            let Some(dir) = file_name.to_str() else {
                continue;
            };
            if let Some(name) = ProducerName::from_dir_name(dir) {
                names.push(name);
            }
        }
        names.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        Ok(names)
    }

    /// Open an existing repository, failing if the directory is absent.
    pub fn get(&self, name: &ProducerName) -> StorageResult<ConfigRepo> {
        if !self.exists(name) {
            return Err(StorageError::RepoDoesNotExist(name.to_string()));
        }
        ConfigRepo::open(self.path(name))
    }

    /// Create a repository for `name`, or open it if it already exists.
    ///
    /// A new repository is initialized with a working tree, given a fresh
    /// access key and `receive.denycurrentbranch = updateInstead`, and has
    /// the report-echoing post-receive hook installed.
    pub fn create(&self, name: &ProducerName) -> StorageResult<ConfigRepo> {
        let path = self.path(name);
        if path.is_dir() {
            return ConfigRepo::open(path);
        }

        info!(producer = %name, path = %path.display(), "creating repository");
        let repo = Repository::init(&path)?;

        {
            let mut config = repo.config()?;
            config.set_str("receive.denycurrentbranch", "updateInstead")?;
        }

        install_post_receive_hook(repo.path())?;
        drop(repo);

        let opened = ConfigRepo::open(path)?;
        opened.regenerate_access_key()?;
        Ok(opened)
    }

    /// Recursively delete a repository. Returns whether anything was removed.
    pub fn remove(&self, name: &ProducerName) -> StorageResult<bool> {
        let path = self.path(name);
        if !path.is_dir() {
            return Ok(false);
        }
        fs::remove_dir_all(&path)?;
        info!(producer = %name, "removed repository");
        Ok(true)
    }

    /// Delete every repository under the root. Test support only.
    pub fn remove_all(&self) -> StorageResult<usize> {
        let mut removed = 0;
        for name in self.list()? {
            if self.remove(&name)? {
                removed += 1;
            }
        }
        Ok(removed)
    }
}

/// Write `.git/hooks/post-receive` with mode 0775.
fn install_post_receive_hook(git_dir: &Path) -> StorageResult<()> {
    let hooks_dir = git_dir.join("hooks");
    fs::create_dir_all(&hooks_dir)?;

    let hook_path = hooks_dir.join("post-receive");
    fs::write(&hook_path, POST_RECEIVE_HOOK)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&hook_path, fs::Permissions::from_mode(0o775))?;
    }

    Ok(())
}
