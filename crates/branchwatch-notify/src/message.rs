//! Human-readable and JSON renderings of a build outcome.

use branchwatch_core::{BuildOutcome, BuildStatus};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Lines of command output included in a mail body.
const OUTPUT_TAIL_LINES: usize = 40;

pub fn subject(outcome: &BuildOutcome) -> String {
    let verdict = match outcome.status {
        BuildStatus::Success => "build succeeded",
        BuildStatus::Failure => "build FAILED",
    };
    format!(
        "[branchwatch] {} {}: {} ({})",
        outcome.job.name,
        outcome.job.branch,
        verdict,
        outcome.job.short_hash()
    )
}

pub fn body(outcome: &BuildOutcome) -> String {
    let job = &outcome.job;
    let mut out = String::new();
    out.push_str(&format!("Project:    {}\n", job.name));
    out.push_str(&format!("Repository: {}\n", job.url));
    out.push_str(&format!("Branch:     {}\n", job.branch));
    out.push_str(&format!("Commit:     {}\n", job.hash));
    out.push_str(&format!("Command:    {}\n", job.command));
    match outcome.exit_code {
        Some(code) => out.push_str(&format!("Status:     {} (exit {})\n", outcome.status, code)),
        None => out.push_str(&format!("Status:     {}\n", outcome.status)),
    }
    out.push_str(&format!(
        "Duration:   {}s\n",
        outcome.duration().num_seconds()
    ));

    out.push_str("\nChanges:\n");
    if outcome.changelog.trim().is_empty() {
        out.push_str("  (no changelog available)\n");
    } else {
        for line in outcome.changelog.lines() {
            out.push_str(&format!("  {}\n", line));
        }
    }

    if !outcome.log.trim().is_empty() {
        out.push_str("\nOutput (tail):\n");
        let lines: Vec<&str> = outcome.log.lines().collect();
        let start = lines.len().saturating_sub(OUTPUT_TAIL_LINES);
        for line in &lines[start..] {
            out.push_str(line);
            out.push('\n');
        }
    }

    out
}

/// JSON document posted to webhooks.
#[derive(Debug, Serialize)]
pub struct Payload<'a> {
    pub job_id: String,
    pub name: &'a str,
    pub url: &'a str,
    pub branch: &'a str,
    pub hash: &'a str,
    pub previous_hash: Option<&'a str>,
    pub status: BuildStatus,
    pub exit_code: Option<i32>,
    pub changelog: &'a str,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl<'a> From<&'a BuildOutcome> for Payload<'a> {
    fn from(outcome: &'a BuildOutcome) -> Self {
        let job = &outcome.job;
        Self {
            job_id: job.id.to_string(),
            name: &job.name,
            url: &job.url,
            branch: &job.branch,
            hash: &job.hash,
            previous_hash: job.previous_hash.as_deref(),
            status: outcome.status,
            exit_code: outcome.exit_code,
            changelog: &outcome.changelog,
            started_at: outcome.started_at,
            finished_at: outcome.finished_at,
        }
    }
}
