//! Redis snapshots: `SAVE`, then stream the RDB file

use super::EngineError;
use crate::utils::ExecCommand;
use std::collections::HashMap;

/// Snapshot location in the official image
pub const DATA_FILE: &str = "/data/dump.rdb";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedisParams {
    pub password: Option<String>,
}

impl RedisParams {
    pub fn from_env(env: &HashMap<String, String>) -> Self {
        Self {
            password: env.get("REDIS_PASSWORD").filter(|p| !p.is_empty()).cloned(),
        }
    }
}

/// Synchronous point-in-time snapshot
pub fn snapshot_command(params: &RedisParams) -> ExecCommand {
    let command = ExecCommand::new(["redis-cli", "SAVE"]);
    match &params.password {
        Some(password) => command.with_env("REDISCLI_AUTH", password),
        None => command,
    }
}

/// `redis-cli` exits 0 even for server errors, so the reply itself is checked
pub fn check_snapshot_reply(stdout: &str) -> Result<(), EngineError> {
    let reply = stdout.trim();
    if reply == "OK" {
        Ok(())
    } else if reply.is_empty() {
        Err(EngineError::SnapshotFailed("SAVE returned no reply".to_string()))
    } else {
        Err(EngineError::SnapshotFailed(reply.to_string()))
    }
}

pub fn dump_command() -> ExecCommand {
    ExecCommand::new(["cat", DATA_FILE])
}
