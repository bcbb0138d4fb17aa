//! Local executor: clone into a scoped directory and run the command on this host.

use crate::command::run_command;
use crate::git::Git;
use crate::workspace::Workspace;
use async_trait::async_trait;
use branchwatch_core::executor::BuildExecutor;
use branchwatch_core::{BuildJob, BuildOutcome, BuildStatus, JobLifecycle, JobState, Result};
use chrono::Utc;
use std::path::PathBuf;
use tracing::{info, warn};

/// Runs builds as plain processes on the local machine.
pub struct LocalExecutor {
    /// Parent of the per-job working directories.
    work_dir: PathBuf,
    git: Git,
}

struct BuildResult {
    status: BuildStatus,
    exit_code: Option<i32>,
    changelog: String,
    log: String,
}

impl BuildResult {
    fn failed(log: String) -> Self {
        Self {
            status: BuildStatus::Failure,
            exit_code: None,
            changelog: String::new(),
            log,
        }
    }
}

impl LocalExecutor {
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            work_dir: work_dir.into(),
            git: Git::new(),
        }
    }

    pub fn with_git(work_dir: impl Into<PathBuf>, git: Git) -> Self {
        Self {
            work_dir: work_dir.into(),
            git,
        }
    }

    async fn build_in(
        &self,
        workspace: &Workspace,
        job: &BuildJob,
        lifecycle: &mut JobLifecycle,
    ) -> Result<BuildResult> {
        let checkout = workspace.checkout_dir();

        lifecycle.advance(JobState::Cloning)?;
        let cloned = match self.git.clone_branch(&job.url, &job.branch, &checkout).await {
            Ok(()) => self.git.checkout(&checkout, &job.url, &job.hash).await,
            Err(e) => Err(e),
        };
        if let Err(e) = cloned {
            warn!(job_id = %job.id, url = %job.url, branch = %job.branch, error = %e, "Clone failed");
            lifecycle.finish(BuildStatus::Failure)?;
            return Ok(BuildResult::failed(format!("clone failed: {}", e)));
        }

        let changelog = self
            .git
            .changelog(&checkout, &job.url, job.previous_hash.as_deref(), &job.hash)
            .await;

        lifecycle.advance(JobState::Running)?;
        let env = [
            ("CI", "true"),
            ("BRANCHWATCH_NAME", job.name.as_str()),
            ("BRANCHWATCH_URL", job.url.as_str()),
            ("BRANCHWATCH_BRANCH", job.branch.as_str()),
            ("BRANCHWATCH_HASH", job.hash.as_str()),
        ];

        let result = match run_command(&checkout, &job.command, &env).await {
            Ok(output) => BuildResult {
                status: BuildStatus::from_exit_code(output.exit_code),
                exit_code: output.exit_code,
                changelog,
                log: output.output,
            },
            Err(e) => BuildResult {
                changelog,
                ..BuildResult::failed(e.to_string())
            },
        };

        lifecycle.finish(result.status)?;
        Ok(result)
    }
}

#[async_trait]
impl BuildExecutor for LocalExecutor {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn execute(&self, job: &BuildJob, lifecycle: &mut JobLifecycle) -> Result<BuildOutcome> {
        let started_at = Utc::now();
        let workspace = Workspace::create(&self.work_dir, &job.url)?;

        let result = self.build_in(&workspace, job, lifecycle).await;

        if let Err(e) = workspace.close() {
            warn!(job_id = %job.id, error = %e, "Failed to remove workspace");
        }
        let result = result?;

        info!(
            job_id = %job.id,
            name = %job.name,
            branch = %job.branch,
            hash = %job.short_hash(),
            status = %result.status,
            exit_code = ?result.exit_code,
            "Build finished"
        );

        Ok(BuildOutcome {
            job: job.clone(),
            status: result.status,
            exit_code: result.exit_code,
            changelog: result.changelog,
            log: result.log,
            started_at,
            finished_at: Utc::now(),
        })
    }
}
