//! Scoped working directories.
//!
//! Each job gets a fresh, uniquely named directory under the configured work
//! dir. The directory is removed when the `Workspace` is dropped, so every exit
//! path (success, failed build, `?` early return, panic unwind) cleans up.

use branchwatch_core::{Error, Result};
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::debug;

/// A job-owned temporary directory.
#[derive(Debug)]
pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    /// Create a new workspace under `base`. Failure here is fatal for the run.
    pub fn create(base: &Path, clone_url: &str) -> Result<Self> {
        std::fs::create_dir_all(base).map_err(|e| {
            Error::Workspace(format!("cannot create {}: {}", base.display(), e))
        })?;

        // Prefix with a digest of the URL so concurrent checkouts are easy to tell apart.
        let repo_hash = format!("{:x}", md5::compute(clone_url));
        let prefix = format!("branchwatch-{}-", &repo_hash[..8]);

        let dir = tempfile::Builder::new()
            .prefix(&prefix)
            .tempdir_in(base)
            .map_err(|e| {
                Error::Workspace(format!(
                    "cannot create working directory in {}: {}",
                    base.display(),
                    e
                ))
            })?;

        debug!(path = %dir.path().display(), "Created workspace");
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Where the repository is cloned to.
    pub fn checkout_dir(&self) -> PathBuf {
        self.dir.path().join("src")
    }

    /// Remove the directory now, reporting any error instead of ignoring it on drop.
    pub fn close(self) -> Result<()> {
        let path = self.dir.path().to_path_buf();
        self.dir.close()?;
        debug!(path = %path.display(), "Removed workspace");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workspace_removed_on_close() {
        let base = tempfile::tempdir().unwrap();
        let workspace = Workspace::create(base.path(), "https://example/repo.git").unwrap();
        let path = workspace.path().to_path_buf();
        std::fs::create_dir_all(workspace.checkout_dir()).unwrap();
        std::fs::write(workspace.checkout_dir().join("file"), "x").unwrap();

        workspace.close().unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_workspace_removed_on_drop() {
        let base = tempfile::tempdir().unwrap();
        let path = {
            let workspace = Workspace::create(base.path(), "https://example/repo.git").unwrap();
            workspace.path().to_path_buf()
        };
        assert!(!path.exists());
    }

    #[test]
    fn test_workspaces_are_unique() {
        let base = tempfile::tempdir().unwrap();
        let a = Workspace::create(base.path(), "https://example/repo.git").unwrap();
        let b = Workspace::create(base.path(), "https://example/repo.git").unwrap();
        assert_ne!(a.path(), b.path());
        assert!(a.path().starts_with(base.path()));
    }

    #[test]
    fn test_unusable_base_is_workspace_error() {
        let base = tempfile::tempdir().unwrap();
        let file = base.path().join("not-a-dir");
        std::fs::write(&file, "x").unwrap();

        let err = Workspace::create(&file, "https://example/repo.git").unwrap_err();
        assert!(matches!(err, Error::Workspace(_)));
        assert!(err.is_fatal());
    }
}
