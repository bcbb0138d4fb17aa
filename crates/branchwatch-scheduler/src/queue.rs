//! In-process job queue shared by the job builder and the workers.

use branchwatch_core::{BuildJob, Error, Result};
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};

/// Create an unbounded job queue.
///
/// The queue closes when the `JobSender` is dropped; workers then drain what is
/// left and `JobReceiver::next` returns `None`.
pub fn job_queue() -> (JobSender, JobReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        JobSender { tx },
        JobReceiver {
            rx: Arc::new(Mutex::new(rx)),
        },
    )
}

/// Producer side. There is exactly one per pass.
#[derive(Debug)]
pub struct JobSender {
    tx: mpsc::UnboundedSender<BuildJob>,
}

impl JobSender {
    /// Fails once every worker has gone away.
    pub fn send(&self, job: BuildJob) -> Result<()> {
        self.tx
            .send(job)
            .map_err(|_| Error::Internal("job queue has no consumers".to_string()))
    }

    /// Close the queue. Equivalent to dropping the sender.
    pub fn close(self) {}
}

/// Consumer side, cloned into every worker.
#[derive(Debug, Clone)]
pub struct JobReceiver {
    rx: Arc<Mutex<mpsc::UnboundedReceiver<BuildJob>>>,
}

impl JobReceiver {
    /// Wait for the next job. Suspends while the queue is open and empty;
    /// returns `None` once it is closed and drained.
    pub async fn next(&self) -> Option<BuildJob> {
        self.rx.lock().await.recv().await
    }
}
