//! Wrapper that lets only one notification through at a time.

use async_trait::async_trait;
use branchwatch_core::notifier::Notifier;
use branchwatch_core::{BuildOutcome, Result};
use tokio::sync::Mutex;

/// Serializes calls to a notifier whose transport cannot handle concurrent use.
pub struct Serialized<N> {
    /// Taken from the inner notifier so logs still say which channel failed.
    name: &'static str,
    inner: Mutex<N>,
}

impl<N: Notifier> Serialized<N> {
    pub fn new(inner: N) -> Self {
        Self {
            name: inner.name(),
            inner: Mutex::new(inner),
        }
    }
}

#[async_trait]
impl<N: Notifier> Notifier for Serialized<N> {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn notify(&self, outcome: &BuildOutcome) -> Result<()> {
        let inner = self.inner.lock().await;
        inner.notify(outcome).await
    }
}
