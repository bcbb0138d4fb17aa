//! CLI command implementations.

pub mod plan;
pub mod run;
pub mod status;
pub mod validate;

use anyhow::{Context, Result};
use branchwatch_config::{RepoList, SystemConfig, load_repo_list, load_system_config};
use branchwatch_executor::LocalExecutor;
use branchwatch_scheduler::{Dispatcher, GitLister};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

const DEFAULT_CONFIG: &str = "branchwatch.kdl";

/// Settings given on the command line. They win over the config file.
pub struct Overrides {
    pub config: Option<PathBuf>,
    pub workers: Option<usize>,
    pub repos: Option<PathBuf>,
    pub cache: Option<PathBuf>,
}

/// Load the system config and apply command-line overrides.
///
/// An explicitly named config file must exist; the default one may be absent.
pub fn load_config(overrides: &Overrides) -> Result<SystemConfig> {
    let mut config = match &overrides.config {
        Some(path) => load_system_config(path)
            .with_context(|| format!("Failed to load config file: {}", path.display()))?,
        None if Path::new(DEFAULT_CONFIG).exists() => load_system_config(Path::new(DEFAULT_CONFIG))
            .with_context(|| format!("Failed to load config file: {}", DEFAULT_CONFIG))?,
        None => {
            info!("No {} found, using defaults", DEFAULT_CONFIG);
            SystemConfig::default()
        }
    };

    if let Some(workers) = overrides.workers {
        anyhow::ensure!(workers > 0, "--workers must be at least 1");
        config.workers = workers;
    }
    if let Some(repos) = &overrides.repos {
        config.repos = repos.clone();
    }
    if let Some(cache) = &overrides.cache {
        config.cache = cache.clone();
    }
    Ok(config)
}

/// Load the repo list and print any skipped lines.
pub fn load_repos(config: &SystemConfig) -> Result<RepoList> {
    let list = load_repo_list(&config.repos)
        .with_context(|| format!("Failed to read repo list: {}", config.repos.display()))?;
    print_repo_errors(&config.repos, &list);
    Ok(list)
}

pub fn print_repo_errors(path: &Path, list: &RepoList) {
    for error in &list.errors {
        eprintln!("{}: {} (skipped)", path.display(), error);
    }
}

pub fn dispatcher(config: &SystemConfig) -> Result<Dispatcher> {
    let notifier = branchwatch_notify::from_config(&config.notify)
        .context("Failed to set up notifications")?;
    Ok(Dispatcher::new(
        Arc::new(GitLister::new(config.remote_timeout)),
        Arc::new(LocalExecutor::new(config.work_dir.clone())),
        notifier,
        config.workers,
    )
    .with_list_concurrency(config.list_concurrency))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn overrides(config: Option<PathBuf>) -> Overrides {
        Overrides {
            config,
            workers: None,
            repos: None,
            cache: None,
        }
    }

    #[test]
    fn test_flags_override_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("branchwatch.kdl");
        std::fs::write(&path, "workers 2\nrepos \"a.list\"\ncache \"a.cache\"\n").unwrap();

        let mut o = overrides(Some(path));
        o.workers = Some(8);
        o.cache = Some(PathBuf::from("b.cache"));
        let config = load_config(&o).unwrap();

        assert_eq!(config.workers, 8);
        assert_eq!(config.repos, PathBuf::from("a.list"));
        assert_eq!(config.cache, PathBuf::from("b.cache"));
    }

    #[test]
    fn test_explicit_missing_config_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let o = overrides(Some(dir.path().join("nope.kdl")));
        assert!(load_config(&o).is_err());
    }

    #[test]
    fn test_zero_workers_flag_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("branchwatch.kdl");
        std::fs::write(&path, "").unwrap();
        let mut o = overrides(Some(path));
        o.workers = Some(0);
        assert!(load_config(&o).is_err());
    }
}
