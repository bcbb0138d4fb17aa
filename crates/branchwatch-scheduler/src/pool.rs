//! Fixed-size pool of workers sharing one job queue.

use crate::cache::ResultCache;
use crate::queue::JobReceiver;
use crate::worker::{Worker, WorkerReport};
use branchwatch_core::executor::BuildExecutor;
use branchwatch_core::notifier::Notifier;
use branchwatch_core::{Error, Result};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Totals across all workers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolReport {
    pub succeeded: usize,
    pub failed: usize,
}

pub struct WorkerPool {
    size: usize,
    executor: Arc<dyn BuildExecutor>,
    cache: Arc<ResultCache>,
    notifier: Arc<dyn Notifier>,
}

impl WorkerPool {
    pub fn new(
        size: usize,
        executor: Arc<dyn BuildExecutor>,
        cache: Arc<ResultCache>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            size: size.max(1),
            executor,
            cache,
            notifier,
        }
    }

    /// Start the workers. They run until `jobs` is closed and drained.
    pub fn spawn(&self, jobs: JobReceiver) -> PoolHandle {
        let abort = Arc::new(AtomicBool::new(false));
        info!(workers = self.size, executor = self.executor.name(), "Starting worker pool");

        let handles = (0..self.size)
            .map(|i| {
                let worker = Worker::new(
                    format!("worker-{}", i),
                    self.executor.clone(),
                    self.cache.clone(),
                    self.notifier.clone(),
                    abort.clone(),
                );
                let jobs = jobs.clone();
                tokio::spawn(async move { worker.run(jobs).await })
            })
            .collect();

        PoolHandle { handles, abort }
    }
}

/// Handle to running workers.
pub struct PoolHandle {
    handles: Vec<JoinHandle<Result<WorkerReport>>>,
    abort: Arc<AtomicBool>,
}

impl PoolHandle {
    pub fn is_aborted(&self) -> bool {
        self.abort.load(Ordering::SeqCst)
    }

    /// Wait for every worker to exit. Returns the first fatal error, but only
    /// after all workers have stopped.
    pub async fn join(self) -> Result<PoolReport> {
        let mut report = PoolReport::default();
        let mut fatal = None;

        for handle in self.handles {
            match handle.await {
                Ok(Ok(worker)) => {
                    report.succeeded += worker.succeeded;
                    report.failed += worker.failed;
                }
                Ok(Err(e)) => {
                    fatal.get_or_insert(e);
                }
                Err(e) => {
                    error!(error = %e, "Worker task panicked");
                    fatal.get_or_insert(Error::Internal(format!("worker task failed: {}", e)));
                }
            }
        }

        match fatal {
            Some(e) => Err(e),
            None => Ok(report),
        }
    }
}
