//! Build jobs, their outcomes and the per-job state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::repository::{BranchHead, CacheKey, RepoEntry};
use crate::{Error, JobId, Result};

/// Result of running a build command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildStatus {
    Success,
    Failure,
}

impl BuildStatus {
    /// Zero is success, anything else (including a missing code) is failure.
    pub fn from_exit_code(code: Option<i32>) -> Self {
        match code {
            Some(0) => BuildStatus::Success,
            _ => BuildStatus::Failure,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, BuildStatus::Success)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BuildStatus::Success => "success",
            BuildStatus::Failure => "failure",
        }
    }
}

impl std::fmt::Display for BuildStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for BuildStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "success" => Ok(BuildStatus::Success),
            "failure" => Ok(BuildStatus::Failure),
            _ => Err(format!("unknown build status: {}", s)),
        }
    }
}

/// A request to build one branch at one commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildJob {
    pub id: JobId,
    pub name: String,
    pub url: String,
    pub branch: String,
    /// Commit observed on the remote; this is the commit that gets built and recorded.
    pub hash: String,
    pub command: String,
    /// Hash from the cache before this run, used for the changelog.
    pub previous_hash: Option<String>,
}

impl BuildJob {
    pub fn new(entry: &RepoEntry, head: &BranchHead, previous_hash: Option<String>) -> Self {
        Self {
            id: JobId::new(),
            name: entry.name.clone(),
            url: head.url.clone(),
            branch: head.branch.clone(),
            hash: head.hash.clone(),
            command: entry.command.clone(),
            previous_hash,
        }
    }

    pub fn key(&self) -> CacheKey {
        CacheKey::new(&self.url, &self.branch)
    }

    pub fn short_hash(&self) -> &str {
        &self.hash[..self.hash.len().min(12)]
    }
}

/// What a worker produced for a job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildOutcome {
    pub job: BuildJob,
    pub status: BuildStatus,
    pub exit_code: Option<i32>,
    /// Human-readable list of commits since the previous build.
    pub changelog: String,
    /// Captured command output (best effort, may be truncated).
    pub log: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl BuildOutcome {
    pub fn duration(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }
}

/// Position of a job in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Queued,
    Cloning,
    Running,
    Succeeded,
    Failed,
    Recorded,
    Notified,
    Done,
}

impl JobState {
    /// Transitions only move forward along the lifecycle; a clone failure may jump
    /// straight from `Cloning` to `Failed`.
    pub fn can_transition_to(&self, next: JobState) -> bool {
        use JobState::*;
        matches!(
            (self, next),
            (Queued, Cloning)
                | (Cloning, Running)
                | (Cloning, Failed)
                | (Running, Succeeded)
                | (Running, Failed)
                | (Succeeded, Recorded)
                | (Failed, Recorded)
                | (Recorded, Notified)
                | (Notified, Done)
        )
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            JobState::Queued => "queued",
            JobState::Cloning => "cloning",
            JobState::Running => "running",
            JobState::Succeeded => "succeeded",
            JobState::Failed => "failed",
            JobState::Recorded => "recorded",
            JobState::Notified => "notified",
            JobState::Done => "done",
        };
        f.write_str(s)
    }
}

/// Tracks a single job through `Queued -> Cloning -> Running -> {Succeeded, Failed}
/// -> Recorded -> Notified -> Done`.
#[derive(Debug)]
pub struct JobLifecycle {
    job_id: JobId,
    state: JobState,
}

impl JobLifecycle {
    pub fn new(job_id: JobId) -> Self {
        Self {
            job_id,
            state: JobState::Queued,
        }
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    pub fn advance(&mut self, next: JobState) -> Result<()> {
        if !self.state.can_transition_to(next) {
            return Err(Error::InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        debug!(job_id = %self.job_id, from = %self.state, to = %next, "Job state change");
        self.state = next;
        Ok(())
    }

    /// Move to `Succeeded` or `Failed` according to `status`.
    pub fn finish(&mut self, status: BuildStatus) -> Result<()> {
        match status {
            BuildStatus::Success => self.advance(JobState::Succeeded),
            BuildStatus::Failure => self.advance(JobState::Failed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_from_exit_code() {
        assert_eq!(BuildStatus::from_exit_code(Some(0)), BuildStatus::Success);
        assert_eq!(BuildStatus::from_exit_code(Some(1)), BuildStatus::Failure);
        assert_eq!(BuildStatus::from_exit_code(Some(-1)), BuildStatus::Failure);
        assert_eq!(BuildStatus::from_exit_code(None), BuildStatus::Failure);
    }

    #[test]
    fn test_status_round_trips_through_str() {
        for status in [BuildStatus::Success, BuildStatus::Failure] {
            assert_eq!(status.as_str().parse::<BuildStatus>().unwrap(), status);
        }
        assert!("ok".parse::<BuildStatus>().is_err());
    }

    #[test]
    fn test_lifecycle_happy_path() {
        let mut lifecycle = JobLifecycle::new(JobId::new());
        for state in [
            JobState::Cloning,
            JobState::Running,
            JobState::Succeeded,
            JobState::Recorded,
            JobState::Notified,
            JobState::Done,
        ] {
            lifecycle.advance(state).unwrap();
        }
        assert_eq!(lifecycle.state(), JobState::Done);
    }

    #[test]
    fn test_lifecycle_clone_failure_skips_running() {
        let mut lifecycle = JobLifecycle::new(JobId::new());
        lifecycle.advance(JobState::Cloning).unwrap();
        lifecycle.finish(BuildStatus::Failure).unwrap();
        lifecycle.advance(JobState::Recorded).unwrap();
        assert_eq!(lifecycle.state(), JobState::Recorded);
    }

    #[test]
    fn test_lifecycle_rejects_backward_and_skipped_steps() {
        let mut lifecycle = JobLifecycle::new(JobId::new());
        lifecycle.advance(JobState::Cloning).unwrap();
        lifecycle.advance(JobState::Running).unwrap();
        assert!(lifecycle.advance(JobState::Cloning).is_err());
        assert!(lifecycle.advance(JobState::Recorded).is_err());
        lifecycle.advance(JobState::Failed).unwrap();
        assert!(lifecycle.advance(JobState::Succeeded).is_err());
        assert!(lifecycle.advance(JobState::Notified).is_err());
        assert_eq!(lifecycle.state(), JobState::Failed);
    }

    #[test]
    fn test_succeeded_requires_running() {
        assert!(!JobState::Cloning.can_transition_to(JobState::Succeeded));
        assert!(JobState::Running.can_transition_to(JobState::Succeeded));
        assert!(!JobState::Queued.can_transition_to(JobState::Failed));
    }
}
