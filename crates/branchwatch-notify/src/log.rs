//! Notifier that writes outcomes to the log.

use async_trait::async_trait;
use branchwatch_core::notifier::Notifier;
use branchwatch_core::{BuildOutcome, Result};
use tracing::{info, warn};

pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn notify(&self, outcome: &BuildOutcome) -> Result<()> {
        let job = &outcome.job;
        let changes = outcome.changelog.lines().count();
        if outcome.status.is_success() {
            info!(name = %job.name, branch = %job.branch, hash = %job.hash, changes, "Build succeeded");
        } else {
            warn!(
                name = %job.name,
                branch = %job.branch,
                hash = %job.hash,
                exit_code = ?outcome.exit_code,
                changes,
                "Build failed"
            );
        }
        Ok(())
    }
}
