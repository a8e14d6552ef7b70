//! Dump executor
//!
//! Runs an engine's dump inside the target container and streams the output
//! into a sink. All exec steps of one target share a single deadline.

use super::discovery::BackupTarget;
use crate::engines::{mysql, postgres, redis, ConnectionParams, EngineError};
use crate::utils::command::truncate_message;
use crate::utils::{ContainerRuntime, ExecCommand, ExecOutput, RuntimeError};
use std::io::{self, Write};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Longest stderr excerpt carried in an error
pub const STDERR_LIMIT: usize = 1024;

/// Why one target failed. Never aborts the rest of the run.
#[derive(Debug, thiserror::Error)]
pub enum TargetError {
    #[error("`{command}` exited with status {exit_code}: {stderr}")]
    Dump {
        command: String,
        exit_code: i64,
        stderr: String,
    },

    #[error("Dump did not finish within {0:?}")]
    Timeout(Duration),

    #[error("Container runtime error: {0}")]
    Runtime(String),

    #[error(transparent)]
    Planning(#[from] EngineError),

    #[error("Failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Upload of {key} failed: {message}")]
    Upload { key: String, message: String },

    #[error("Backup task panicked: {0}")]
    Panicked(String),
}

/// What the dump produced
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DumpSummary {
    /// Uncompressed bytes written to the sink
    pub bytes: u64,
}

struct Deadline {
    started: Instant,
    total: Duration,
}

impl Deadline {
    fn new(total: Duration) -> Self {
        Self {
            started: Instant::now(),
            total,
        }
    }

    fn remaining(&self) -> Result<Duration, TargetError> {
        self.total
            .checked_sub(self.started.elapsed())
            .filter(|d| !d.is_zero())
            .ok_or(TargetError::Timeout(self.total))
    }
}

/// Run the target's dump, streaming stdout into `sink`.
///
/// On error the sink may hold partial output; the caller discards it.
pub fn run_dump(
    runtime: &dyn ContainerRuntime,
    target: &BackupTarget,
    sink: &mut dyn Write,
    timeout: Duration,
) -> Result<DumpSummary, TargetError> {
    let deadline = Deadline::new(timeout);
    let step = Step {
        runtime,
        target,
        deadline: &deadline,
    };

    match &target.params {
        ConnectionParams::Postgres(params) => step.stream(&postgres::dump_command(params), sink),
        ConnectionParams::MySql(params) => dump_mysql(&step, params, sink),
        ConnectionParams::Redis(params) => dump_redis(&step, params, sink),
    }
}

fn dump_mysql(
    step: &Step<'_>,
    params: &mysql::MySqlParams,
    sink: &mut dyn Write,
) -> Result<DumpSummary, TargetError> {
    let credentials = params.require_credentials(step.target.engine)?;

    let probe = step.exec(&mysql::probe_command(), &mut io::sink())?;
    let tools = mysql::tools_for(probe.success());
    debug!("Using {} for {}", tools.dump, step.target.container_name);

    let listing = step.capture(&mysql::list_databases_command(tools, credentials))?;
    let databases = mysql::parse_database_list(&listing);
    if databases.is_empty() {
        warn!(
            "No user databases found in {}, writing an empty backup",
            step.target.container_name
        );
        return Ok(DumpSummary::default());
    }

    info!(
        "Dumping {} database(s) from {}: {}",
        databases.len(),
        step.target.container_name,
        databases.join(", ")
    );
    step.stream(&mysql::dump_command(tools, credentials, &databases), sink)
}

fn dump_redis(
    step: &Step<'_>,
    params: &redis::RedisParams,
    sink: &mut dyn Write,
) -> Result<DumpSummary, TargetError> {
    let reply = step.capture(&redis::snapshot_command(params))?;
    redis::check_snapshot_reply(&reply)?;
    step.stream(&redis::dump_command(), sink)
}

/// One exec step against a target, bounded by the shared deadline
struct Step<'a> {
    runtime: &'a dyn ContainerRuntime,
    target: &'a BackupTarget,
    deadline: &'a Deadline,
}

impl Step<'_> {
    fn exec(&self, command: &ExecCommand, sink: &mut dyn Write) -> Result<ExecOutput, TargetError> {
        let remaining = self.deadline.remaining()?;
        self.runtime
            .exec(&self.target.container_id, command, sink, remaining)
            .map_err(|e| match e {
                RuntimeError::Timeout { .. } => TargetError::Timeout(self.deadline.total),
                other => TargetError::Runtime(other.to_string()),
            })
    }

    /// Run a short command and return its stdout
    fn capture(&self, command: &ExecCommand) -> Result<String, TargetError> {
        let mut stdout = Vec::new();
        let output = self.exec(command, &mut stdout)?;
        let stdout = String::from_utf8_lossy(&stdout).into_owned();
        check_exit(command, &output, &stdout)?;
        Ok(stdout)
    }

    /// Run the dump command proper, forwarding stdout to the sink
    fn stream(&self, command: &ExecCommand, sink: &mut dyn Write) -> Result<DumpSummary, TargetError> {
        let output = self.exec(command, sink)?;
        check_exit(command, &output, "")?;

        let stderr = output.stderr_text();
        if !stderr.is_empty() {
            debug!("{} stderr: {}", command.program(), truncate_message(&stderr, STDERR_LIMIT));
        }

        Ok(DumpSummary {
            bytes: output.stdout_bytes,
        })
    }
}

fn check_exit(command: &ExecCommand, output: &ExecOutput, stdout: &str) -> Result<(), TargetError> {
    if output.success() {
        return Ok(());
    }

    let mut message = output.stderr_text();
    if message.is_empty() {
        message = stdout.trim().to_string();
    }
    if message.is_empty() {
        message = "no error output".to_string();
    }

    Err(TargetError::Dump {
        command: command.program().to_string(),
        exit_code: output.exit_code,
        stderr: truncate_message(&message, STDERR_LIMIT),
    })
}
