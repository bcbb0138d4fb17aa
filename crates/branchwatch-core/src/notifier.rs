//! Notifier trait: reports a finished job to a human-facing channel.

use async_trait::async_trait;

use crate::job::BuildOutcome;
use crate::Result;

/// Receives one call per completed job.
///
/// Implementations must be safe to call from several workers at once. Notifiers
/// built on a transport that is not should serialize internally.
#[async_trait]
pub trait Notifier: Send + Sync {
    fn name(&self) -> &'static str;

    async fn notify(&self, outcome: &BuildOutcome) -> Result<()>;
}

/// Discards every notification.
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    fn name(&self) -> &'static str {
        "noop"
    }

    async fn notify(&self, _outcome: &BuildOutcome) -> Result<()> {
        Ok(())
    }
}
