//! `validate`: check configuration and repo list without touching remotes.

use super::{Overrides, load_config, print_repo_errors};
use anyhow::{Context, Result};
use branchwatch_config::load_repo_list;

pub fn validate(overrides: &Overrides) -> Result<()> {
    let config = load_config(overrides)?;
    println!(
        "Configuration OK: {} workers, cache {}, work dir {}",
        config.workers,
        config.cache.display(),
        config.work_dir.display()
    );

    let list = load_repo_list(&config.repos)
        .with_context(|| format!("Failed to read repo list: {}", config.repos.display()))?;
    print_repo_errors(&config.repos, &list);
    println!(
        "{}: {} entries, {} errors",
        config.repos.display(),
        list.entries.len(),
        list.errors.len()
    );

    if !list.errors.is_empty() {
        anyhow::bail!("repo list has {} invalid lines", list.errors.len());
    }
    Ok(())
}
