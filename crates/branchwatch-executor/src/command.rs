//! External command execution.

use branchwatch_core::{Error, Result};
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

/// Keep at most this much of a command's output.
pub const MAX_LOG_BYTES: usize = 64 * 1024;

/// Exit status and captured output of a finished command.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    /// `None` when the process was killed by a signal.
    pub exit_code: Option<i32>,
    /// Stdout followed by stderr, truncated from the front to `MAX_LOG_BYTES`.
    pub output: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Run `command` through `sh -c` with `dir` as its current directory.
///
/// A nonzero exit is a normal result. `Err` means the process could not be started.
pub async fn run_command(
    dir: &Path,
    command: &str,
    env: &[(&str, &str)],
) -> Result<CommandOutput> {
    debug!(dir = %dir.display(), command = %command, "Running command");

    let output = Command::new("/bin/sh")
        .arg("-c")
        .arg(command)
        .current_dir(dir)
        .envs(env.iter().copied())
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| Error::ExecutionFailed(format!("failed to start `{}`: {}", command, e)))?;

    let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
    text.push_str(&String::from_utf8_lossy(&output.stderr));

    Ok(CommandOutput {
        exit_code: output.status.code(),
        output: tail(text, MAX_LOG_BYTES),
    })
}

/// Keep the last `max` bytes of `text`, cut on a char boundary.
pub(crate) fn tail(text: String, max: usize) -> String {
    if text.len() <= max {
        return text;
    }
    let mut start = text.len() - max;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    format!("[... output truncated ...]\n{}", &text[start..])
}
