//! Job builder: turns repo entries into build jobs for branches that changed.

use crate::cache::ResultCache;
use crate::lister::BranchLister;
use crate::queue::JobSender;
use branchwatch_core::{BuildJob, CacheKey, RepoEntry};
use futures::StreamExt;
use futures::stream;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A repository that could not be listed this pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFailure {
    pub name: String,
    pub url: String,
    pub message: String,
}

/// What the builder did during one pass.
#[derive(Debug, Clone, Default)]
pub struct BuilderReport {
    /// Jobs handed to the queue.
    pub queued: usize,
    /// Branches whose head matched the cache.
    pub unchanged: usize,
    /// Branch listings dropped because the same (url, branch) was already seen.
    pub duplicates: usize,
    pub remote_errors: Vec<RemoteFailure>,
}

/// Compares remote branch heads against the cache and queues changed branches.
pub struct JobBuilder {
    lister: Arc<dyn BranchLister>,
    cache: Arc<ResultCache>,
    /// Number of remote listings in flight at once.
    concurrency: usize,
}

impl JobBuilder {
    pub fn new(lister: Arc<dyn BranchLister>, cache: Arc<ResultCache>) -> Self {
        Self {
            lister,
            cache,
            concurrency: 1,
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Process every entry, sending jobs to `sink`.
    ///
    /// Listings run concurrently but are consumed in entry order, so when two
    /// entries share a URL the first one wins. A given (url, branch) is queued at
    /// most once per call. Stops early if the queue has lost its consumers.
    pub async fn run(&self, entries: &[RepoEntry], sink: &JobSender) -> BuilderReport {
        let mut report = BuilderReport::default();
        let mut seen: HashSet<CacheKey> = HashSet::new();

        let mut listings = stream::iter(entries)
            .map(|entry| async move { (entry, self.lister.list_branches(&entry.url).await) })
            .buffered(self.concurrency);

        while let Some((entry, listing)) = listings.next().await {
            let heads = match listing {
                Ok(heads) => heads,
                Err(e) => {
                    warn!(name = %entry.name, url = %entry.url, error = %e, "Skipping repository");
                    report.remote_errors.push(RemoteFailure {
                        name: entry.name.clone(),
                        url: entry.url.clone(),
                        message: e.to_string(),
                    });
                    continue;
                }
            };

            for head in heads {
                if !seen.insert(head.key()) {
                    debug!(name = %entry.name, url = %head.url, branch = %head.branch, "Branch already scheduled this pass");
                    report.duplicates += 1;
                    continue;
                }

                let cached = self.cache.lookup(&head.url, &head.branch);
                if let Some(cached) = &cached {
                    if cached.hash == head.hash {
                        info!(
                            name = %entry.name,
                            branch = %head.branch,
                            hash = %head.hash,
                            status = %cached.status,
                            "No change"
                        );
                        report.unchanged += 1;
                        continue;
                    }
                }

                let job = BuildJob::new(entry, &head, cached.map(|c| c.hash));
                info!(
                    job_id = %job.id,
                    name = %job.name,
                    branch = %job.branch,
                    hash = %job.short_hash(),
                    previous = ?job.previous_hash,
                    "Queueing build"
                );

                if let Err(e) = sink.send(job) {
                    warn!(error = %e, "Job queue closed, stopping job builder");
                    return report;
                }
                report.queued += 1;
            }
        }

        report
    }
}
