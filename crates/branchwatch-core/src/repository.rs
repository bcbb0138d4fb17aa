//! Repository entries, remote branch heads and cached build results.

use serde::{Deserialize, Serialize};

use crate::job::BuildStatus;

/// Length of a full git commit id in hex.
pub const COMMIT_HASH_LEN: usize = 40;

/// Check that `s` is exactly 40 lowercase hex characters.
pub fn is_commit_hash(s: &str) -> bool {
    s.len() == COMMIT_HASH_LEN && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

/// A repository to watch, as supplied by the repo list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoEntry {
    /// Project name used in notifications.
    pub name: String,
    /// Remote URL passed to git.
    pub url: String,
    /// Shell command run inside the checkout.
    pub command: String,
}

impl RepoEntry {
    pub fn new(
        name: impl Into<String>,
        url: impl Into<String>,
        command: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            command: command.into(),
        }
    }
}

/// A branch observed on a remote together with its head commit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BranchHead {
    pub url: String,
    pub branch: String,
    pub hash: String,
}

impl BranchHead {
    /// Returns `None` when `hash` is not a full lowercase commit id or the branch is empty.
    pub fn new(url: impl Into<String>, branch: impl Into<String>, hash: &str) -> Option<Self> {
        let branch = branch.into();
        if branch.is_empty() || !is_commit_hash(hash) {
            return None;
        }
        Some(Self {
            url: url.into(),
            branch,
            hash: hash.to_string(),
        })
    }

    pub fn key(&self) -> CacheKey {
        CacheKey::new(&self.url, &self.branch)
    }
}

/// Identity of a cache record: one per (repository URL, branch).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CacheKey {
    pub url: String,
    pub branch: String,
}

impl CacheKey {
    pub fn new(url: impl Into<String>, branch: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            branch: branch.into(),
        }
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.url, self.branch)
    }
}

/// Last known build result for a branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheRecord {
    pub url: String,
    pub branch: String,
    pub hash: String,
    pub status: BuildStatus,
}

impl CacheRecord {
    pub fn key(&self) -> CacheKey {
        CacheKey::new(&self.url, &self.branch)
    }
}
