//! `plan`: list remotes and show what would be built.

use super::{Overrides, dispatcher, load_config, load_repos};
use anyhow::{Context, Result};
use branchwatch_scheduler::ResultCache;
use std::sync::Arc;

pub async fn plan(overrides: &Overrides) -> Result<()> {
    let config = load_config(overrides)?;
    let repos = load_repos(&config)?;
    let (cache, _) = ResultCache::load(&config.cache).context("Failed to load result cache")?;

    let (jobs, report) = dispatcher(&config)?
        .plan(&repos.entries, Arc::new(cache))
        .await;

    if jobs.is_empty() {
        println!("Nothing to build");
    }
    for job in &jobs {
        let previous = job
            .previous_hash
            .as_deref()
            .map(|h| &h[..h.len().min(12)])
            .unwrap_or("new");
        println!(
            "{:<20} {:<24} {} (was {})  {}",
            job.name,
            job.branch,
            job.short_hash(),
            previous,
            job.command
        );
    }
    println!(
        "{} to build, {} unchanged, {} remote errors",
        report.queued,
        report.unchanged,
        report.remote_errors.len()
    );
    for failure in &report.remote_errors {
        println!("  {} ({}): {}", failure.name, failure.url, failure.message);
    }
    Ok(())
}
