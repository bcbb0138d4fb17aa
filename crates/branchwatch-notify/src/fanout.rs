//! Sends each outcome to several notifiers.

use async_trait::async_trait;
use branchwatch_core::notifier::Notifier;
use branchwatch_core::{BuildOutcome, Error, Result};
use futures::future::join_all;
use std::sync::Arc;

/// Delivers to every inner notifier. One failing does not stop the others.
pub struct FanoutNotifier {
    notifiers: Vec<Arc<dyn Notifier>>,
}

impl FanoutNotifier {
    pub fn new(notifiers: Vec<Arc<dyn Notifier>>) -> Self {
        Self { notifiers }
    }
}

#[async_trait]
impl Notifier for FanoutNotifier {
    fn name(&self) -> &'static str {
        "fanout"
    }

    async fn notify(&self, outcome: &BuildOutcome) -> Result<()> {
        let results = join_all(self.notifiers.iter().map(|n| n.notify(outcome))).await;

        let failures: Vec<String> = self
            .notifiers
            .iter()
            .zip(results)
            .filter_map(|(n, r)| r.err().map(|e| format!("{}: {}", n.name(), e)))
            .collect();

        if failures.is_empty() {
            Ok(())
        } else {
            Err(Error::Notify(failures.join("; ")))
        }
    }
}
