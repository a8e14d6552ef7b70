//! PostgreSQL dumps via `pg_dumpall`

use crate::utils::ExecCommand;
use std::collections::HashMap;

pub const DEFAULT_USER: &str = "postgres";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostgresParams {
    pub user: String,
    pub password: Option<String>,
}

impl PostgresParams {
    /// `POSTGRES_USER` (default `postgres`) and `POSTGRES_PASSWORD`
    pub fn from_env(env: &HashMap<String, String>) -> Self {
        let user = env
            .get("POSTGRES_USER")
            .filter(|u| !u.is_empty())
            .cloned()
            .unwrap_or_else(|| DEFAULT_USER.to_string());
        let password = env.get("POSTGRES_PASSWORD").filter(|p| !p.is_empty()).cloned();
        Self { user, password }
    }
}

/// Whole-cluster logical dump, written to stdout
pub fn dump_command(params: &PostgresParams) -> ExecCommand {
    let command = ExecCommand::new(["pg_dumpall", "-U", params.user.as_str()]);
    match &params.password {
        Some(password) => command.with_env("PGPASSWORD", password),
        None => command,
    }
}
