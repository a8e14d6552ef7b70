//! Docker CLI utilities for container discovery and exec streaming

use super::command::run_command_stdout;
use super::docker_ops::{ContainerInfo, ExecCommand, ExecOutput, RuntimeError};
use serde::Deserialize;
use std::collections::HashMap;
use std::io::{self, Write};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tracing::{debug, warn};

const COPY_BUFFER_SIZE: usize = 64 * 1024;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectEntry {
    id: String,
    name: String,
    config: InspectConfig,
    #[serde(default)]
    state: Option<InspectState>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectConfig {
    image: String,
    #[serde(default)]
    env: Option<Vec<String>>,
    #[serde(default)]
    labels: Option<HashMap<String, String>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectState {
    running: bool,
}

/// List the ids of all running containers
pub fn list_running_ids(binary: &str, timeout: Duration) -> Result<Vec<String>, RuntimeError> {
    let output = run_command_stdout(binary, &["ps", "-q", "--no-trunc"], timeout)
        .map_err(|e| RuntimeError::Query(format!("{:#}", e)))?;

    Ok(output
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(String::from)
        .collect())
}

/// Inspect containers by id.
///
/// A container that disappears between listing and inspection is skipped.
pub fn inspect_containers(
    binary: &str,
    ids: &[String],
    timeout: Duration,
) -> Result<Vec<ContainerInfo>, RuntimeError> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    let mut args = vec!["inspect", "--type", "container"];
    args.extend(ids.iter().map(String::as_str));

    match run_command_stdout(binary, &args, timeout) {
        Ok(json) => parse_inspect_output(&json),
        Err(e) if ids.len() > 1 => {
            warn!("Bulk inspect failed ({:#}), inspecting containers one by one", e);
            let mut containers = Vec::new();
            for id in ids {
                match run_command_stdout(binary, &["inspect", "--type", "container", id], timeout) {
                    Ok(json) => containers.extend(parse_inspect_output(&json)?),
                    Err(e) => warn!("Skipping container {}: {:#}", id, e),
                }
            }
            Ok(containers)
        }
        Err(e) => Err(RuntimeError::Query(format!("{:#}", e))),
    }
}

/// Parse the JSON array printed by `docker inspect`
pub fn parse_inspect_output(json: &str) -> Result<Vec<ContainerInfo>, RuntimeError> {
    let entries: Vec<InspectEntry> =
        serde_json::from_str(json).map_err(|e| RuntimeError::Parse(e.to_string()))?;

    Ok(entries
        .into_iter()
        .filter(|entry| entry.state.as_ref().map_or(true, |s| s.running))
        .map(|entry| ContainerInfo {
            id: entry.id,
            name: entry.name.trim_start_matches('/').to_string(),
            image: entry.config.image,
            env: parse_env_list(entry.config.env.as_deref().unwrap_or_default()),
            labels: entry.config.labels.unwrap_or_default(),
        })
        .collect())
}

/// Parse `KEY=value` pairs; the first `=` separates key from value
pub fn parse_env_list(entries: &[String]) -> HashMap<String, String> {
    entries
        .iter()
        .map(|entry| match entry.split_once('=') {
            Some((key, value)) => (key.to_string(), value.to_string()),
            None => (entry.clone(), String::new()),
        })
        .collect()
}

/// Prefix `argv` with the in-container `timeout` utility.
///
/// Killing the local exec client does not stop the process inside the
/// container, so the container enforces the same deadline on its own,
/// rounded up to whole seconds.
pub fn bounded_argv(argv: &[String], timeout: Duration) -> Vec<String> {
    let seconds = timeout.as_secs() + u64::from(timeout.subsec_nanos() > 0);
    let mut bounded = vec![
        "timeout".to_string(),
        "-s".to_string(),
        "KILL".to_string(),
        seconds.max(1).to_string(),
    ];
    bounded.extend(argv.iter().cloned());
    bounded
}

/// Run a command inside a container, streaming its stdout into `sink`.
///
/// Stderr is captured in full for diagnostics. Environment values reach the
/// exec session through the client's own environment, never its arguments.
/// On timeout the exec client is killed and the in-container `timeout`
/// terminates the command.
pub fn exec_streaming(
    binary: &str,
    container_id: &str,
    command: &ExecCommand,
    sink: &mut dyn Write,
    timeout: Duration,
) -> Result<ExecOutput, RuntimeError> {
    let mut cmd = tokio::process::Command::new(binary);
    cmd.arg("exec");
    for (key, value) in &command.env {
        cmd.arg("--env").arg(key).env(key, value);
    }
    cmd.arg(container_id)
        .args(bounded_argv(&command.argv, timeout))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    debug!("Exec in {}: {}", container_id, command.display());

    let handle = tokio::runtime::Handle::try_current()
        .map_err(|e| RuntimeError::Query(format!("No Tokio runtime available: {}", e)))?;

    handle.block_on(async move {
        let mut child = cmd.spawn().map_err(|source| RuntimeError::Spawn {
            container: container_id.to_string(),
            source,
        })?;

        let mut stdout_pipe = child
            .stdout
            .take()
            .ok_or_else(|| RuntimeError::Stream(io::Error::other("stdout was not captured")))?;
        let mut stderr_pipe = child
            .stderr
            .take()
            .ok_or_else(|| RuntimeError::Stream(io::Error::other("stderr was not captured")))?;

        let stderr_task = tokio::spawn(async move {
            let mut buf = Vec::new();
            stderr_pipe.read_to_end(&mut buf).await.map(|_| buf)
        });

        let transfer = async {
            let mut buf = vec![0u8; COPY_BUFFER_SIZE];
            let mut total = 0u64;
            loop {
                let n = stdout_pipe.read(&mut buf).await.map_err(RuntimeError::Stream)?;
                if n == 0 {
                    break;
                }
                sink.write_all(&buf[..n]).map_err(RuntimeError::Sink)?;
                total += n as u64;
            }
            let status = child.wait().await.map_err(RuntimeError::Stream)?;
            Ok::<_, RuntimeError>((status, total))
        };

        let result = tokio::time::timeout(timeout, transfer).await;

        match result {
            Ok(Ok((status, stdout_bytes))) => {
                let stderr = match stderr_task.await {
                    Ok(Ok(buf)) => buf,
                    Ok(Err(e)) => format!("<failed to read stderr: {}>", e).into_bytes(),
                    Err(e) => format!("<stderr reader failed: {}>", e).into_bytes(),
                };
                Ok(ExecOutput {
                    exit_code: status.code().map(i64::from).unwrap_or(-1),
                    stderr,
                    stdout_bytes,
                })
            }
            Ok(Err(e)) => {
                if let Err(kill_err) = child.start_kill() {
                    debug!("Failed to kill exec client: {}", kill_err);
                }
                stderr_task.abort();
                Err(e)
            }
            Err(_) => {
                warn!(
                    "Exec in {} exceeded {:?}, terminating exec session",
                    container_id, timeout
                );
                if let Err(kill_err) = child.start_kill() {
                    debug!("Failed to kill exec client: {}", kill_err);
                }
                stderr_task.abort();
                Err(RuntimeError::Timeout {
                    container: container_id.to_string(),
                    timeout,
                })
            }
        }
    })
}
