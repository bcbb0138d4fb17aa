//! Git operations used while building a job.

use branchwatch_core::{Error, Result};
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Number of commits shown when there is no usable previous hash.
const CHANGELOG_FALLBACK_COMMITS: &str = "20";

/// Thin wrapper around the `git` binary.
#[derive(Debug, Clone)]
pub struct Git {
    program: String,
}

impl Default for Git {
    fn default() -> Self {
        Self::new()
    }
}

impl Git {
    pub fn new() -> Self {
        Self {
            program: "git".to_string(),
        }
    }

    /// Use a different git executable.
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        // Never block on a credential prompt.
        cmd.env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    async fn run(&self, mut cmd: Command, url: &str) -> Result<String> {
        let output = cmd
            .output()
            .await
            .map_err(|e| Error::remote(url, format!("failed to run git: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::remote(url, stderr.trim().to_string()));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// `git ls-remote --heads <url>`; returns the raw output.
    pub async fn ls_remote_heads(&self, url: &str) -> Result<String> {
        let mut cmd = self.command();
        cmd.args(["ls-remote", "--heads", "--", url]);
        self.run(cmd, url).await
    }

    /// Clone `branch` of `url` into `dest` with enough history for a changelog.
    pub async fn clone_branch(&self, url: &str, branch: &str, dest: &Path) -> Result<()> {
        info!(url = %url, branch = %branch, path = %dest.display(), "Cloning repository");

        let mut cmd = self.command();
        cmd.args(["clone", "--quiet", "--single-branch", "--branch", branch, "--", url])
            .arg(dest);
        self.run(cmd, url).await?;

        debug!(path = %dest.display(), "Repository cloned");
        Ok(())
    }

    /// Detach the checkout at exactly `hash`.
    pub async fn checkout(&self, dir: &Path, url: &str, hash: &str) -> Result<()> {
        let mut cmd = self.command();
        cmd.args(["-c", "advice.detachedHead=false", "checkout", "--quiet", hash])
            .current_dir(dir);
        self.run(cmd, url).await.map(|_| ())
    }

    /// One line per commit between `previous` and `hash`.
    ///
    /// Falls back to the most recent commits when `previous` is unknown or no
    /// longer reachable (force push). Errors produce an empty changelog.
    pub async fn changelog(
        &self,
        dir: &Path,
        url: &str,
        previous: Option<&str>,
        hash: &str,
    ) -> String {
        if let Some(previous) = previous {
            let mut cmd = self.command();
            cmd.args(["log", "--oneline", "--no-decorate"])
                .arg(format!("{}..{}", previous, hash))
                .current_dir(dir);
            match self.run(cmd, url).await {
                Ok(log) => return log,
                Err(e) => {
                    debug!(url = %url, previous = %previous, error = %e, "Previous commit not in history")
                }
            }
        }

        let mut cmd = self.command();
        cmd.args(["log", "--oneline", "--no-decorate", "-n", CHANGELOG_FALLBACK_COMMITS, hash])
            .current_dir(dir);
        match self.run(cmd, url).await {
            Ok(log) => log,
            Err(e) => {
                warn!(url = %url, error = %e, "Could not produce changelog");
                String::new()
            }
        }
    }
}
