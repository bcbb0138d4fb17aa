//! Notifier that POSTs a JSON document per outcome.

use crate::message::Payload;
use async_trait::async_trait;
use branchwatch_core::notifier::Notifier;
use branchwatch_core::{BuildOutcome, Error, Result};
use std::time::Duration;
use tracing::debug;
use url::Url;

pub struct WebhookNotifier {
    client: reqwest::Client,
    url: Url,
}

impl WebhookNotifier {
    /// `timeout` bounds the whole request, connect through response body.
    pub fn new(url: Url, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Notify(format!("cannot build HTTP client: {}", e)))?;
        Ok(Self { client, url })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    fn name(&self) -> &'static str {
        "webhook"
    }

    async fn notify(&self, outcome: &BuildOutcome) -> Result<()> {
        let response = self
            .client
            .post(self.url.clone())
            .json(&Payload::from(outcome))
            .send()
            .await
            .map_err(|e| Error::Notify(format!("webhook {}: {}", self.url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Notify(format!(
                "webhook {} returned {}",
                self.url, status
            )));
        }

        debug!(url = %self.url, job_id = %outcome.job.id, "Webhook delivered");
        Ok(())
    }
}
