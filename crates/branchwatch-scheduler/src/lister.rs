//! Remote branch listing.

use async_trait::async_trait;
use branchwatch_core::{BranchHead, Error, Result};
use branchwatch_executor::Git;
use std::time::Duration;
use tracing::debug;

/// Lists the branches of a remote repository and their head commits.
#[async_trait]
pub trait BranchLister: Send + Sync {
    /// Fails with `Error::Remote` on network or auth failure, or when the remote
    /// reports no parsable branches.
    async fn list_branches(&self, url: &str) -> Result<Vec<BranchHead>>;
}

/// Parse `git ls-remote` output.
///
/// Accepts lines of the form `<40-hex-hash><whitespace>refs/heads/<branch>` and
/// silently ignores everything else (tags, symbolic refs, noise).
pub fn parse_ls_remote(url: &str, output: &str) -> Vec<BranchHead> {
    output
        .lines()
        .filter_map(|line| parse_line(url, line))
        .collect()
}

fn parse_line(url: &str, line: &str) -> Option<BranchHead> {
    let (hash, reference) = line.trim().split_once(char::is_whitespace)?;
    let branch = reference.trim_start().strip_prefix("refs/heads/")?;
    if branch.contains(char::is_whitespace) {
        return None;
    }
    BranchHead::new(url, branch, hash)
}

/// `BranchLister` backed by `git ls-remote --heads`.
pub struct GitLister {
    git: Git,
    timeout: Duration,
}

impl GitLister {
    pub fn new(timeout: Duration) -> Self {
        Self {
            git: Git::new(),
            timeout,
        }
    }

    pub fn with_git(git: Git, timeout: Duration) -> Self {
        Self { git, timeout }
    }
}

#[async_trait]
impl BranchLister for GitLister {
    async fn list_branches(&self, url: &str) -> Result<Vec<BranchHead>> {
        let output = tokio::time::timeout(self.timeout, self.git.ls_remote_heads(url))
            .await
            .map_err(|_| {
                Error::remote(url, format!("ls-remote timed out after {:?}", self.timeout))
            })??;

        let heads = parse_ls_remote(url, &output);
        if heads.is_empty() {
            return Err(Error::remote(url, "no branches found in ls-remote output"));
        }

        debug!(url = %url, branches = heads.len(), "Listed remote branches");
        Ok(heads)
    }
}
