//! `status`: print the result cache.

use super::{Overrides, load_config};
use anyhow::{Context, Result};
use branchwatch_scheduler::ResultCache;

pub fn status(overrides: &Overrides) -> Result<()> {
    let config = load_config(overrides)?;
    let (cache, errors) =
        ResultCache::load(&config.cache).context("Failed to load result cache")?;

    for error in &errors {
        eprintln!("{}: {} (skipped)", config.cache.display(), error);
    }
    if cache.is_empty() {
        println!("No builds recorded in {}", config.cache.display());
        return Ok(());
    }

    for record in cache.records() {
        println!(
            "{:<8} {} {} {}",
            record.status.as_str(),
            record.hash.get(..12).unwrap_or(&record.hash),
            record.url,
            record.branch
        );
    }
    Ok(())
}
