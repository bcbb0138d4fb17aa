//! Dispatcher - drives one discover, dedupe, dispatch, execute, record, notify pass.

use crate::builder::{BuilderReport, JobBuilder, RemoteFailure};
use crate::cache::ResultCache;
use crate::lister::BranchLister;
use crate::pool::WorkerPool;
use crate::queue::job_queue;
use branchwatch_core::executor::BuildExecutor;
use branchwatch_core::notifier::Notifier;
use branchwatch_core::{BuildJob, RepoEntry, Result};
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info};

/// Outcome of a pass.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub queued: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub unchanged: usize,
    pub duplicates: usize,
    pub remote_errors: Vec<RemoteFailure>,
}

impl RunSummary {
    fn new(builder: BuilderReport) -> Self {
        Self {
            queued: builder.queued,
            unchanged: builder.unchanged,
            duplicates: builder.duplicates,
            remote_errors: builder.remote_errors,
            ..Default::default()
        }
    }
}

/// Wires the job builder, the queue and the worker pool together.
pub struct Dispatcher {
    lister: Arc<dyn BranchLister>,
    executor: Arc<dyn BuildExecutor>,
    notifier: Arc<dyn Notifier>,
    workers: usize,
    list_concurrency: usize,
}

impl Dispatcher {
    pub fn new(
        lister: Arc<dyn BranchLister>,
        executor: Arc<dyn BuildExecutor>,
        notifier: Arc<dyn Notifier>,
        workers: usize,
    ) -> Self {
        Self {
            lister,
            executor,
            notifier,
            workers: workers.max(1),
            list_concurrency: 1,
        }
    }

    pub fn with_list_concurrency(mut self, concurrency: usize) -> Self {
        self.list_concurrency = concurrency.max(1);
        self
    }

    /// Run one pass against an in-memory cache.
    ///
    /// Workers start before discovery so builds overlap with listing. The queue
    /// is closed only after every entry has been processed, and this returns
    /// only after every worker has exited.
    pub async fn run_pass(
        &self,
        entries: &[RepoEntry],
        cache: Arc<ResultCache>,
    ) -> Result<RunSummary> {
        let (sender, receiver) = job_queue();
        let pool = WorkerPool::new(
            self.workers,
            self.executor.clone(),
            cache.clone(),
            self.notifier.clone(),
        )
        .spawn(receiver);

        let builder = JobBuilder::new(self.lister.clone(), cache)
            .with_concurrency(self.list_concurrency)
            .run(entries, &sender)
            .await;
        sender.close();

        let mut summary = RunSummary::new(builder);
        let pool = pool.join().await?;
        summary.succeeded = pool.succeeded;
        summary.failed = pool.failed;

        info!(
            queued = summary.queued,
            succeeded = summary.succeeded,
            failed = summary.failed,
            unchanged = summary.unchanged,
            remote_errors = summary.remote_errors.len(),
            "Pass complete"
        );
        Ok(summary)
    }

    /// Load the cache from `cache_path`, run one pass, and persist the cache.
    ///
    /// The cache is persisted even when the pass aborts, so results of jobs that
    /// did finish are kept.
    pub async fn run_once(&self, entries: &[RepoEntry], cache_path: &Path) -> Result<RunSummary> {
        let (cache, _) = ResultCache::load(cache_path)?;
        let cache = Arc::new(cache);

        let result = self.run_pass(entries, cache.clone()).await;
        if let Err(e) = &result {
            error!(error = %e, "Pass aborted");
        }

        cache.persist(cache_path)?;
        result
    }

    /// List remotes and return the jobs a pass would dispatch, without running them.
    pub async fn plan(
        &self,
        entries: &[RepoEntry],
        cache: Arc<ResultCache>,
    ) -> (Vec<BuildJob>, BuilderReport) {
        let (sender, receiver) = job_queue();
        let report = JobBuilder::new(self.lister.clone(), cache)
            .with_concurrency(self.list_concurrency)
            .run(entries, &sender)
            .await;
        sender.close();

        let mut jobs = Vec::with_capacity(report.queued);
        while let Some(job) = receiver.next().await {
            jobs.push(job);
        }
        (jobs, report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use branchwatch_core::{
        BranchHead, BuildOutcome, BuildStatus, CacheKey, Error, JobLifecycle, JobState,
    };
    use chrono::Utc;
    use parking_lot::Mutex;
    use std::collections::{HashMap, HashSet};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    const URL: &str = "https://example/repo.git";
    const A: &str = "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
    const B: &str = "bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb";

    struct FakeLister(HashMap<String, Vec<BranchHead>>);

    #[async_trait]
    impl BranchLister for FakeLister {
        async fn list_branches(&self, url: &str) -> Result<Vec<BranchHead>> {
            self.0
                .get(url)
                .cloned()
                .ok_or_else(|| Error::remote(url, "not found"))
        }
    }

    fn lister(url: &str, branches: &[(&str, &str)]) -> Arc<dyn BranchLister> {
        let heads = branches
            .iter()
            .map(|(branch, hash)| BranchHead::new(url, *branch, hash).unwrap())
            .collect();
        Arc::new(FakeLister(HashMap::from([(url.to_string(), heads)])))
    }

    /// Exits with `fail_code` for branches in `failing`, else 0. Tracks how many
    /// jobs run at once and which keys were built.
    #[derive(Default)]
    struct FakeExecutor {
        failing: HashSet<String>,
        fatal_on: Option<String>,
        running: AtomicUsize,
        max_running: AtomicUsize,
        built: Mutex<Vec<CacheKey>>,
    }

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
            if self.fatal_on.as_deref() == Some(job.branch.as_str()) {
                return Err(Error::Workspace("no space left".to_string()));
            }

            let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_running.fetch_max(now, Ordering::SeqCst);
            lifecycle.advance(JobState::Cloning)?;
            lifecycle.advance(JobState::Running)?;
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.running.fetch_sub(1, Ordering::SeqCst);

            self.built.lock().push(job.key());
            let code = if self.failing.contains(&job.branch) { 1 } else { 0 };
            let status = BuildStatus::from_exit_code(Some(code));
            lifecycle.finish(status)?;
            Ok(BuildOutcome {
                job: job.clone(),
                status,
                exit_code: Some(code),
                changelog: format!("{} build", job.short_hash()),
                log: String::new(),
                started_at: Utc::now(),
                finished_at: Utc::now(),
            })
        }
    }

    #[derive(Default)]
    struct RecordingNotifier(Mutex<Vec<(String, String, BuildStatus, String)>>);

    #[async_trait]
    impl Notifier for RecordingNotifier {
        fn name(&self) -> &'static str {
            "recording"
        }

        async fn notify(&self, outcome: &BuildOutcome) -> Result<()> {
            self.0.lock().push((
                outcome.job.name.clone(),
                outcome.job.branch.clone(),
                outcome.status,
                outcome.changelog.clone(),
            ));
            Ok(())
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_end_to_end_single_branch() {
        let dir = tempfile::tempdir().unwrap();
        let cache_path = dir.path().join("cache");
        let notifier = Arc::new(RecordingNotifier::default());
        let dispatcher = Dispatcher::new(
            lister(URL, &[("main", A)]),
            Arc::new(FakeExecutor::default()),
            notifier.clone(),
            2,
        );
        let entries = [RepoEntry::new("demo", URL, "make")];

        let summary = dispatcher.run_once(&entries, &cache_path).await.unwrap();
        assert_eq!(summary.queued, 1);
        assert_eq!(summary.succeeded, 1);

        let (cache, errors) = ResultCache::load(&cache_path).unwrap();
        assert!(errors.is_empty());
        let records = cache.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].url, URL);
        assert_eq!(records[0].branch, "main");
        assert_eq!(records[0].hash, A);
        assert_eq!(records[0].status, BuildStatus::Success);

        let seen = notifier.0.lock().clone();
        assert_eq!(seen.len(), 1);
        assert_eq!(
            (seen[0].0.as_str(), seen[0].1.as_str(), seen[0].2),
            ("demo", "main", BuildStatus::Success)
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_second_pass_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let cache_path = dir.path().join("cache");
        let executor = Arc::new(FakeExecutor::default());
        let dispatcher = Dispatcher::new(
            lister(URL, &[("main", A)]),
            executor.clone(),
            Arc::new(RecordingNotifier::default()),
            2,
        );
        let entries = [RepoEntry::new("demo", URL, "make")];

        dispatcher.run_once(&entries, &cache_path).await.unwrap();
        let before = std::fs::read_to_string(&cache_path).unwrap();

        let summary = dispatcher.run_once(&entries, &cache_path).await.unwrap();
        assert_eq!(summary.queued, 0);
        assert_eq!(summary.unchanged, 1);
        assert_eq!(executor.built.lock().len(), 1);
        assert_eq!(std::fs::read_to_string(&cache_path).unwrap(), before);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_pool_runs_jobs_concurrently_and_records_all() {
        let branches: Vec<(String, &str)> =
            (0..12).map(|i| (format!("branch-{}", i), A)).collect();
        let refs: Vec<(&str, &str)> = branches.iter().map(|(b, h)| (b.as_str(), *h)).collect();

        let executor = Arc::new(FakeExecutor {
            failing: HashSet::from(["branch-3".to_string(), "branch-7".to_string()]),
            ..Default::default()
        });
        let notifier = Arc::new(RecordingNotifier::default());
        let dispatcher = Dispatcher::new(lister(URL, &refs), executor.clone(), notifier.clone(), 4);
        let cache = Arc::new(ResultCache::new());

        let summary = dispatcher
            .run_pass(&[RepoEntry::new("demo", URL, "make")], cache.clone())
            .await
            .unwrap();

        assert_eq!(summary.queued, 12);
        assert_eq!(summary.succeeded, 10);
        assert_eq!(summary.failed, 2);
        assert_eq!(cache.len(), 12);
        assert_eq!(
            cache.lookup(URL, "branch-3").unwrap().status,
            BuildStatus::Failure
        );
        assert_eq!(notifier.0.lock().len(), 12);

        let max = executor.max_running.load(Ordering::SeqCst);
        assert!(max > 1 && max <= 4, "max concurrent jobs was {}", max);

        let built: HashSet<_> = executor.built.lock().iter().cloned().collect();
        assert_eq!(built.len(), 12, "every key built exactly once");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_changed_branch_rebuilt_with_previous_hash() {
        let cache = Arc::new(ResultCache::new());
        cache.update(URL, "main", A, BuildStatus::Success);
        let notifier = Arc::new(RecordingNotifier::default());
        let dispatcher = Dispatcher::new(
            lister(URL, &[("main", B)]),
            Arc::new(FakeExecutor::default()),
            notifier.clone(),
            1,
        );

        let (jobs, _) = dispatcher
            .plan(&[RepoEntry::new("demo", URL, "make")], cache.clone())
            .await;
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].previous_hash.as_deref(), Some(A));

        dispatcher
            .run_pass(&[RepoEntry::new("demo", URL, "make")], cache.clone())
            .await
            .unwrap();
        assert_eq!(cache.lookup(URL, "main").unwrap().hash, B);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_fatal_error_aborts_but_persists_cache() {
        let dir = tempfile::tempdir().unwrap();
        let cache_path = dir.path().join("cache");
        let executor = Arc::new(FakeExecutor {
            fatal_on: Some("broken".to_string()),
            ..Default::default()
        });
        let dispatcher = Dispatcher::new(
            lister(URL, &[("main", A), ("broken", B)]),
            executor,
            Arc::new(RecordingNotifier::default()),
            1,
        );

        let err = dispatcher
            .run_once(&[RepoEntry::new("demo", URL, "make")], &cache_path)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Workspace(_)));

        // `main` is listed first and runs to completion on the single worker.
        let (cache, _) = ResultCache::load(&cache_path).unwrap();
        assert_eq!(cache.lookup(URL, "main").unwrap().status, BuildStatus::Success);
        assert!(cache.lookup(URL, "broken").is_none());
    }

    #[tokio::test]
    async fn test_remote_error_reported_in_summary() {
        let dispatcher = Dispatcher::new(
            lister(URL, &[("main", A)]),
            Arc::new(FakeExecutor::default()),
            Arc::new(RecordingNotifier::default()),
            1,
        );
        let entries = [
            RepoEntry::new("gone", "https://example/gone.git", "make"),
            RepoEntry::new("demo", URL, "make"),
        ];

        let summary = dispatcher
            .run_pass(&entries, Arc::new(ResultCache::new()))
            .await
            .unwrap();
        assert_eq!(summary.remote_errors.len(), 1);
        assert_eq!(summary.remote_errors[0].url, "https://example/gone.git");
        assert_eq!(summary.succeeded, 1);
    }
}
