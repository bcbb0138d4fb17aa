//! `run` and `watch`: dispatch builds for changed branches.

use super::{Overrides, dispatcher, load_config, load_repos};
use anyhow::{Context, Result};
use branchwatch_scheduler::{ResultCache, RunSummary};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

/// One pass, then exit.
pub async fn run(overrides: &Overrides) -> Result<()> {
    let config = load_config(overrides)?;
    let repos = load_repos(&config)?;

    let summary = dispatcher(&config)?
        .run_once(&repos.entries, &config.cache)
        .await
        .context("Build pass aborted")?;
    print_summary(&summary);
    Ok(())
}

/// Repeat passes until Ctrl-C. The repo list is re-read each pass so edits are
/// picked up without a restart; the interrupt is only honoured between passes.
pub async fn watch(overrides: &Overrides, interval: Option<u64>) -> Result<()> {
    let config = load_config(overrides)?;
    let interval = interval.map(Duration::from_secs).unwrap_or(config.interval);
    let dispatcher = dispatcher(&config)?;

    let (cache, _) = ResultCache::load(&config.cache).context("Failed to load result cache")?;
    let cache = Arc::new(cache);

    info!(interval_secs = interval.as_secs(), "Watching repositories");
    loop {
        let repos = load_repos(&config)?;
        let pass = dispatcher.run_pass(&repos.entries, cache.clone()).await;
        if let Err(e) = &pass {
            error!(error = %e, "Pass aborted");
        }
        cache
            .persist(&config.cache)
            .context("Failed to persist result cache")?;
        let summary = pass.context("Build pass aborted")?;
        print_summary(&summary);

        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, stopping");
                return Ok(());
            }
        }
    }
}

fn print_summary(summary: &RunSummary) {
    println!(
        "queued {}, succeeded {}, failed {}, unchanged {}, duplicates {}, remote errors {}",
        summary.queued,
        summary.succeeded,
        summary.failed,
        summary.unchanged,
        summary.duplicates,
        summary.remote_errors.len()
    );
    for failure in &summary.remote_errors {
        println!("  {} ({}): {}", failure.name, failure.url, failure.message);
    }
}
