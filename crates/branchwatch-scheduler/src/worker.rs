//! Worker that processes jobs from the queue.

use crate::cache::ResultCache;
use crate::queue::JobReceiver;
use branchwatch_core::executor::BuildExecutor;
use branchwatch_core::notifier::Notifier;
use branchwatch_core::{
    BuildJob, BuildOutcome, BuildStatus, JobLifecycle, JobState, Result,
};
use chrono::Utc;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{error, info, warn};

/// Per-worker job counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerReport {
    pub succeeded: usize,
    pub failed: usize,
}

/// A worker that takes jobs off the queue and runs each one end to end.
pub struct Worker {
    id: String,
    executor: Arc<dyn BuildExecutor>,
    cache: Arc<ResultCache>,
    notifier: Arc<dyn Notifier>,
    /// Set by any worker that hits a fatal error; all workers stop taking jobs.
    abort: Arc<AtomicBool>,
}

impl Worker {
    pub fn new(
        id: impl Into<String>,
        executor: Arc<dyn BuildExecutor>,
        cache: Arc<ResultCache>,
        notifier: Arc<dyn Notifier>,
        abort: Arc<AtomicBool>,
    ) -> Self {
        Self {
            id: id.into(),
            executor,
            cache,
            notifier,
            abort,
        }
    }

    /// Run the worker loop until the queue is closed and drained, or the run is aborted.
    pub async fn run(self, jobs: JobReceiver) -> Result<WorkerReport> {
        info!(worker_id = %self.id, "Starting worker");
        let mut report = WorkerReport::default();

        while let Some(job) = jobs.next().await {
            if self.abort.load(Ordering::SeqCst) {
                warn!(worker_id = %self.id, job_id = %job.id, name = %job.name, branch = %job.branch, "Run aborted, dropping job");
                break;
            }

            match self.process(job).await {
                Ok(outcome) if outcome.status.is_success() => report.succeeded += 1,
                Ok(_) => report.failed += 1,
                Err(e) => {
                    error!(worker_id = %self.id, error = %e, "Fatal error, aborting run");
                    self.abort.store(true, Ordering::SeqCst);
                    return Err(e);
                }
            }
        }

        info!(
            worker_id = %self.id,
            succeeded = report.succeeded,
            failed = report.failed,
            "Worker finished"
        );
        Ok(report)
    }

    /// Execute, record and notify one job. Only fatal errors are returned.
    pub async fn process(&self, job: BuildJob) -> Result<BuildOutcome> {
        let mut lifecycle = JobLifecycle::new(job.id);
        info!(worker_id = %self.id, job_id = %job.id, name = %job.name, branch = %job.branch, "Claimed job");

        let outcome = match self.executor.execute(&job, &mut lifecycle).await {
            Ok(outcome) => outcome,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                error!(worker_id = %self.id, job_id = %job.id, error = %e, "Job failed internally");
                if !matches!(lifecycle.state(), JobState::Succeeded | JobState::Failed) {
                    step(&mut lifecycle, JobState::Failed);
                }
                let now = Utc::now();
                BuildOutcome {
                    job: job.clone(),
                    status: BuildStatus::Failure,
                    exit_code: None,
                    changelog: String::new(),
                    log: format!("internal error: {}", e),
                    started_at: now,
                    finished_at: now,
                }
            }
        };

        self.cache
            .update(&job.url, &job.branch, &job.hash, outcome.status);
        step(&mut lifecycle, JobState::Recorded);

        if let Err(e) = self.notifier.notify(&outcome).await {
            warn!(
                worker_id = %self.id,
                job_id = %job.id,
                notifier = self.notifier.name(),
                error = %e,
                "Notification failed"
            );
        }
        step(&mut lifecycle, JobState::Notified);
        step(&mut lifecycle, JobState::Done);

        Ok(outcome)
    }
}

/// Advance the lifecycle, logging instead of failing: recording and notifying
/// must happen even if an executor left the job in an unexpected state.
fn step(lifecycle: &mut JobLifecycle, next: JobState) {
    if let Err(e) = lifecycle.advance(next) {
        warn!(error = %e, "Unexpected job state transition");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use branchwatch_core::{BranchHead, Error, RepoEntry};
    use parking_lot::Mutex;

    const A: &str = "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";

    enum Behaviour {
        Exit(i32),
        Internal,
        Fatal,
    }

    struct FakeExecutor(Behaviour);

    #[async_trait]
    impl BuildExecutor for FakeExecutor {
        fn name(&self) -> &'static str {
            "fake"
        }

        async fn execute(
            &self,
            job: &BuildJob,
            lifecycle: &mut JobLifecycle,
        ) -> Result<BuildOutcome> {
            let code = match self.0 {
                Behaviour::Exit(code) => code,
                Behaviour::Internal => {
                    lifecycle.advance(JobState::Cloning)?;
                    return Err(Error::Internal("boom".to_string()));
                }
                Behaviour::Fatal => return Err(Error::Workspace("disk full".to_string())),
            };
            lifecycle.advance(JobState::Cloning)?;
            lifecycle.advance(JobState::Running)?;
            let status = BuildStatus::from_exit_code(Some(code));
            lifecycle.finish(status)?;
            let now = Utc::now();
            Ok(BuildOutcome {
                job: job.clone(),
                status,
                exit_code: Some(code),
                changelog: "abc123 change".to_string(),
                log: String::new(),
                started_at: now,
                finished_at: now,
            })
        }
    }

    #[derive(Default)]
    struct RecordingNotifier {
        fail: bool,
        seen: Mutex<Vec<(String, String, BuildStatus)>>,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        fn name(&self) -> &'static str {
            "recording"
        }

        async fn notify(&self, outcome: &BuildOutcome) -> Result<()> {
            self.seen.lock().push((
                outcome.job.name.clone(),
                outcome.job.branch.clone(),
                outcome.status,
            ));
            if self.fail {
                return Err(Error::Notify("smtp down".to_string()));
            }
            Ok(())
        }
    }

    fn job() -> BuildJob {
        let entry = RepoEntry::new("demo", "https://example/repo.git", "make");
        let head = BranchHead::new("https://example/repo.git", "main", A).unwrap();
        BuildJob::new(&entry, &head, None)
    }

    fn worker(
        behaviour: Behaviour,
        notifier: Arc<RecordingNotifier>,
    ) -> (Worker, Arc<ResultCache>) {
        let cache = Arc::new(ResultCache::new());
        let worker = Worker::new(
            "test",
            Arc::new(FakeExecutor(behaviour)),
            cache.clone(),
            notifier,
            Arc::new(AtomicBool::new(false)),
        );
        (worker, cache)
    }

    #[tokio::test]
    async fn test_success_recorded_and_notified() {
        let notifier = Arc::new(RecordingNotifier::default());
        let (worker, cache) = worker(Behaviour::Exit(0), notifier.clone());

        let outcome = worker.process(job()).await.unwrap();
        assert_eq!(outcome.status, BuildStatus::Success);

        let cached = cache.lookup("https://example/repo.git", "main").unwrap();
        assert_eq!(cached.hash, A);
        assert_eq!(cached.status, BuildStatus::Success);
        assert_eq!(
            notifier.seen.lock().clone(),
            vec![("demo".to_string(), "main".to_string(), BuildStatus::Success)]
        );
    }

    #[tokio::test]
    async fn test_nonzero_exit_recorded_as_failure() {
        let notifier = Arc::new(RecordingNotifier::default());
        let (worker, cache) = worker(Behaviour::Exit(2), notifier.clone());

        let outcome = worker.process(job()).await.unwrap();
        assert_eq!(outcome.status, BuildStatus::Failure);
        assert_eq!(
            cache.lookup("https://example/repo.git", "main").unwrap().status,
            BuildStatus::Failure
        );
        assert_eq!(notifier.seen.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_notifier_failure_does_not_fail_job() {
        let notifier = Arc::new(RecordingNotifier {
            fail: true,
            ..Default::default()
        });
        let (worker, cache) = worker(Behaviour::Exit(0), notifier);

        let outcome = worker.process(job()).await.unwrap();
        assert_eq!(outcome.status, BuildStatus::Success);
        assert_eq!(
            cache.lookup("https://example/repo.git", "main").unwrap().status,
            BuildStatus::Success
        );
    }

    #[tokio::test]
    async fn test_internal_error_becomes_failure() {
        let notifier = Arc::new(RecordingNotifier::default());
        let (worker, cache) = worker(Behaviour::Internal, notifier.clone());

        let outcome = worker.process(job()).await.unwrap();
        assert_eq!(outcome.status, BuildStatus::Failure);
        assert!(outcome.log.contains("boom"));
        assert_eq!(cache.len(), 1);
        assert_eq!(notifier.seen.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_fatal_error_aborts_without_recording() {
        let notifier = Arc::new(RecordingNotifier::default());
        let (worker, cache) = worker(Behaviour::Fatal, notifier.clone());

        let err = worker.process(job()).await.unwrap_err();
        assert!(err.is_fatal());
        assert!(cache.is_empty());
        assert!(notifier.seen.lock().is_empty());
    }
}
