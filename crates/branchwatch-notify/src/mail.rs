//! Notifier that pipes an RFC 5322 message to a sendmail-compatible command.

use crate::message;
use async_trait::async_trait;
use branchwatch_config::MailConfig;
use branchwatch_core::notifier::Notifier;
use branchwatch_core::{BuildOutcome, Error, Result};
use chrono::Utc;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::sync::Mutex;
use tracing::debug;

/// Sends one mail per outcome. Deliveries are serialized: the mail command is
/// never run twice at once.
pub struct MailNotifier {
    config: MailConfig,
    /// A mail command still running after this long is killed.
    timeout: Duration,
    lock: Mutex<()>,
}

impl MailNotifier {
    pub fn new(config: MailConfig, timeout: Duration) -> Self {
        Self {
            config,
            timeout,
            lock: Mutex::new(()),
        }
    }

    /// Render the full message, headers included.
    pub fn render(&self, outcome: &BuildOutcome) -> String {
        let mut out = String::new();
        out.push_str(&format!("From: {}\r\n", self.config.from));
        out.push_str(&format!("To: {}\r\n", self.config.to.join(", ")));
        out.push_str(&format!("Subject: {}\r\n", message::subject(outcome)));
        out.push_str(&format!("Date: {}\r\n", Utc::now().to_rfc2822()));
        out.push_str("MIME-Version: 1.0\r\n");
        out.push_str("Content-Type: text/plain; charset=utf-8\r\n");
        out.push_str("\r\n");
        for line in message::body(outcome).lines() {
            out.push_str(line);
            out.push_str("\r\n");
        }
        out
    }

    async fn deliver(&self, text: &str) -> Result<()> {
        let (program, args) = self
            .config
            .command
            .split_first()
            .ok_or_else(|| Error::Notify("mail command is empty".to_string()))?;

        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(server) = &self.config.server {
            command.env("BRANCHWATCH_SMTP_SERVER", server);
        }
        if let Some(user) = &self.config.user {
            command.env("BRANCHWATCH_SMTP_USER", user);
        }
        if let Some(password) = &self.config.password {
            command.env("BRANCHWATCH_SMTP_PASSWORD", password);
        }

        let mut child = command
            .spawn()
            .map_err(|e| Error::Notify(format!("failed to start {}: {}", program, e)))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(text.as_bytes())
                .await
                .map_err(|e| Error::Notify(format!("failed to write to {}: {}", program, e)))?;
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| Error::Notify(format!("{} did not finish: {}", program, e)))?;

        if !output.status.success() {
            return Err(Error::Notify(format!(
                "{} exited with {}: {}",
                program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl Notifier for MailNotifier {
    fn name(&self) -> &'static str {
        "mail"
    }

    async fn notify(&self, outcome: &BuildOutcome) -> Result<()> {
        let text = self.render(outcome);
        let _guard = self.lock.lock().await;
        // Dropping the timed-out delivery drops the child, which kills it.
        tokio::time::timeout(self.timeout, self.deliver(&text))
            .await
            .map_err(|_| {
                Error::Notify(format!("mail command timed out after {:?}", self.timeout))
            })??;
        debug!(to = ?self.config.to, job_id = %outcome.job.id, "Mail sent");
        Ok(())
    }
}
