//! core type-safe wrappers around git primitives for the repository engine.

use std::fmt;
use std::fmt::Formatter;

use git2::Oid;
use serde::{Deserialize, Serialize};

/// the all-zero revision used as a placeholder for branches that do not exist yet
pub const ZERO_REVISION: &str = "0000000000000000000000000000000000000000";

/// This makes sure we don't accidentally pass a blob ID where a commit ID
/// is expected. The inner Oid is only accessible within the storage module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CommitId(pub(crate) Oid);

impl CommitId {
    pub(crate) fn new(oid: Oid) -> Self {
        Self(oid)
    }

    /// raw Oid (for internal use only)
    pub(crate) fn raw(&self) -> Oid {
        self.0
    }

    /// parse CommitId from a full hex string
    pub fn from_hex(hex: &str) -> Result<Self, git2::Error> {
        Oid::from_str(hex).map(CommitId)
    }

    /// full 40-hex form, the ETag representation
    pub fn to_hex(&self) -> String {
        self.0.to_string()
    }

    /// short form of the commit ID
    pub fn short(&self) -> String {
        self.0.to_string()[..7].to_string()
    }
}

impl fmt::Display for CommitId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for CommitId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

/// A validated producer name.
///
/// Producer names become repository directory basenames, so they are
/// restricted to prevent path traversal and keep filesystem compatibility.
///
/// Valid names:
/// - 1-64 characters
/// - Alphanumeric, underscores, hyphens only
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProducerName(String);

impl ProducerName {
    /// create a new ProducerName, validating the input
    pub fn new(name: impl Into<String>) -> Result<Self, InvalidNameError> {
        let name = name.into();
        Self::validate(&name)?;
        Ok(Self(name))
    }

    fn validate(name: &str) -> Result<(), InvalidNameError> {
        if name.is_empty() {
            return Err(InvalidNameError::Empty);
        }

        if name.len() > 64 {
            return Err(InvalidNameError::TooLong(name.len()));
        }

        for (i, c) in name.chars().enumerate() {
            if !c.is_ascii_alphanumeric() && c != '_' && c != '-' {
                return Err(InvalidNameError::InvalidCharacter { char: c, position: i });
            }
        }

        Ok(())
    }

    /// get the string representation
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// directory basename under the root, e.g. `acme.git`
    pub fn dir_name(&self) -> String {
        format!("{}.git", self.0)
    }

    /// recover the producer name from a repository directory basename
    pub fn from_dir_name(dir: &str) -> Option<Self> {
        let name = dir.strip_suffix(".git")?;
        Self::new(name).ok()
    }
}

impl fmt::Display for ProducerName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for ProducerName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// a branch name, with special handling for environment branches
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BranchName(String);

impl BranchName {
    /// prefix for environment branches
    pub const ENV_PREFIX: &'static str = "env/";

    /// create a new BranchName
    pub fn new(name: impl Into<String>) -> Result<Self, InvalidNameError> {
        let name = name.into();
        // basic validation, git is more permissive but we stay restrictive
        if name.is_empty() {
            return Err(InvalidNameError::Empty);
        }
        if name.contains("..") || name.ends_with('/') || name.starts_with('/') {
            return Err(InvalidNameError::InvalidPath(name));
        }
        Ok(Self(name))
    }

    /// create an environment branch name
    pub fn for_env(env_id: &str) -> Result<Self, InvalidNameError> {
        Self::new(format!("{}{}", Self::ENV_PREFIX, env_id))
    }

    /// check if this is an environment branch
    pub fn is_env_branch(&self) -> bool {
        self.0.starts_with(Self::ENV_PREFIX)
    }

    /// extract the environment ID if this is an environment branch
    pub fn env_id(&self) -> Option<&str> {
        if self.is_env_branch() {
            Some(&self.0[Self::ENV_PREFIX.len()..])
        } else {
            None
        }
    }

    /// get the full ref path (e.g., "refs/heads/env/dev")
    pub fn as_ref_path(&self) -> String {
        format!("refs/heads/{}", self.0)
    }

    /// get the short name
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BranchName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// git signature (author/committer info)
#[derive(Debug, Clone)]
pub struct GitSignature {
    pub name: String,
    pub email: String,
}

impl GitSignature {
    /// create a new signature
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
        }
    }

    /// fixed service identity used for all commits created through the REST surface
    pub fn service() -> Self {
        Self::new("gitconf", "gitconf@localhost")
    }

    /// convert to git2::Signature
    pub(crate) fn to_git2_signature(&self) -> Result<git2::Signature<'static>, git2::Error> {
        git2::Signature::now(&self.name, &self.email)
    }
}

impl Default for GitSignature {
    fn default() -> Self {
        Self::service()
    }
}

/// error type for invalid names (producers, branches)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidNameError {
    Empty,
    TooLong(usize),
    InvalidCharacter { char: char, position: usize },
    InvalidPath(String),
}

impl fmt::Display for InvalidNameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "name cannot be empty"),
            Self::TooLong(len) => write!(f, "name too long: {} characters", len),
            Self::InvalidCharacter { char, position } => {
                write!(f, "invalid character '{}' at position {}", char, position)
            }
            Self::InvalidPath(path) => write!(f, "invalid path: '{}'", path),
        }
    }
}

impl std::error::Error for InvalidNameError {}
