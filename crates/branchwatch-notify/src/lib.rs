//! Build outcome notifiers for branchwatch.
//!
//! Provides notifier implementations for reporting finished jobs:
//! - Log (tracing)
//! - Webhook (JSON POST)
//! - Mail (piped to a sendmail-compatible command)
//! - Fan-out and serializing wrappers

pub mod fanout;
pub mod log;
pub mod mail;
pub mod message;
pub mod serialized;
pub mod webhook;

use branchwatch_config::NotifyConfig;
use branchwatch_core::Result;
use std::sync::Arc;

pub use branchwatch_core::notifier::{NoopNotifier, Notifier};
pub use fanout::FanoutNotifier;
pub use log::LogNotifier;
pub use mail::MailNotifier;
pub use serialized::Serialized;
pub use webhook::WebhookNotifier;

/// Build the notifier described by `config`.
pub fn from_config(config: &NotifyConfig) -> Result<Arc<dyn Notifier>> {
    let mut notifiers: Vec<Arc<dyn Notifier>> = Vec::new();

    if config.log {
        notifiers.push(Arc::new(LogNotifier));
    }
    for url in &config.webhooks {
        notifiers.push(Arc::new(WebhookNotifier::new(url.clone(), config.timeout)?));
    }
    if let Some(mail) = &config.mail {
        notifiers.push(Arc::new(MailNotifier::new(mail.clone(), config.timeout)));
    }

    Ok(match notifiers.len() {
        0 => Arc::new(NoopNotifier),
        1 => notifiers.remove(0),
        _ => Arc::new(FanoutNotifier::new(notifiers)),
    })
}
