//! Utilities for running host commands with proper error handling and timeouts

use anyhow::{Context, Result};
use std::process::{Output, Stdio};
use std::time::Duration;
use tracing::{debug, error};

/// Run a command to completion, failing on timeout or non-zero exit.
///
/// Must be called from a blocking thread that belongs to a Tokio runtime;
/// the child is killed if the timeout elapses.
pub fn run_command(program: &str, args: &[&str], timeout: Duration) -> Result<Output> {
    debug!("Running command: {} {}", program, args.join(" "));

    let mut cmd = tokio::process::Command::new(program);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let handle = tokio::runtime::Handle::try_current()
        .context("Host commands must run inside the Tokio runtime")?;

    let output = handle.block_on(async {
        let child = cmd
            .spawn()
            .with_context(|| format!("Failed to execute {}", program))?;

        match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(output) => output.with_context(|| format!("Failed to execute {}", program)),
            Err(_) => Err(anyhow::anyhow!("Command timed out after {:?}", timeout)),
        }
    })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        error!("Command failed: {} {}", program, args.join(" "));
        error!("Stderr: {}", stderr);
        anyhow::bail!(
            "Command failed with exit code {:?}: {}",
            output.status.code(),
            stderr.trim()
        );
    }

    Ok(output)
}

/// Run a command and return stdout as string
pub fn run_command_stdout(program: &str, args: &[&str], timeout: Duration) -> Result<String> {
    let output = run_command(program, args, timeout)?;
    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

/// Shorten a diagnostic message to at most `max_chars` characters
pub fn truncate_message(message: &str, max_chars: usize) -> String {
    let trimmed = message.trim();
    if trimmed.chars().count() <= max_chars {
        return trimmed.to_string();
    }

    let keep = max_chars.saturating_sub(3);
    let mut truncated: String = trimmed.chars().take(keep).collect();
    truncated.push_str("...");
    truncated
}
