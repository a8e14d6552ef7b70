//! MySQL-family dumps (MySQL and MariaDB)
//!
//! A dump is three exec steps: probe which client tools the image ships,
//! list the user databases, then dump them all into one stream.

use super::{EngineError, EngineKind};
use crate::config::parse_flag;
use crate::utils::ExecCommand;
use std::collections::HashMap;

/// Schemas that belong to the server itself and are never dumped
pub const SYSTEM_SCHEMAS: [&str; 4] = ["information_schema", "performance_schema", "mysql", "sys"];

const PASSWORD_ENV: &str = "MYSQL_PWD";

const LOOKED_FOR: &str = "MARIADB_ROOT_PASSWORD, MYSQL_ROOT_PASSWORD, \
                          MARIADB_USER/MARIADB_PASSWORD, MYSQL_USER/MYSQL_PASSWORD";

/// User and password to connect with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MySqlCredentials {
    pub user: String,
    /// `None` when the image allows an empty root password
    pub password: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MySqlParams {
    /// `None` when the environment declares no usable credentials
    pub credentials: Option<MySqlCredentials>,
}

impl MySqlParams {
    /// Root passwords win over application users; MariaDB names win over
    /// MySQL names.
    pub fn from_env(env: &HashMap<String, String>) -> Self {
        let get = |key: &str| env.get(key).filter(|v| !v.is_empty()).cloned();

        let root = get("MARIADB_ROOT_PASSWORD").or_else(|| get("MYSQL_ROOT_PASSWORD"));
        let credentials = if let Some(password) = root {
            Some(MySqlCredentials {
                user: "root".to_string(),
                password: Some(password),
            })
        } else if let (Some(user), Some(password)) = (get("MARIADB_USER"), get("MARIADB_PASSWORD")) {
            Some(MySqlCredentials {
                user,
                password: Some(password),
            })
        } else if let (Some(user), Some(password)) = (get("MYSQL_USER"), get("MYSQL_PASSWORD")) {
            Some(MySqlCredentials {
                user,
                password: Some(password),
            })
        } else if allows_empty_root_password(env) {
            Some(MySqlCredentials {
                user: "root".to_string(),
                password: None,
            })
        } else {
            None
        };

        Self { credentials }
    }

    /// Credentials, or the planning error for a container that has none
    pub fn require_credentials(&self, kind: EngineKind) -> Result<&MySqlCredentials, EngineError> {
        self.credentials
            .as_ref()
            .ok_or_else(|| EngineError::MissingCredentials {
                engine: kind,
                looked_for: LOOKED_FOR.to_string(),
            })
    }
}

fn allows_empty_root_password(env: &HashMap<String, String>) -> bool {
    ["MARIADB_ALLOW_EMPTY_ROOT_PASSWORD", "MYSQL_ALLOW_EMPTY_PASSWORD"]
        .iter()
        .filter_map(|key| env.get(*key))
        .any(|value| parse_flag(value))
}

/// Client programs used for one container
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MySqlTools {
    pub client: &'static str,
    pub dump: &'static str,
}

pub const MARIADB_TOOLS: MySqlTools = MySqlTools {
    client: "mariadb",
    dump: "mariadb-dump",
};

pub const MYSQL_TOOLS: MySqlTools = MySqlTools {
    client: "mysql",
    dump: "mysqldump",
};

/// Recent MariaDB images drop the `mysql*` compatibility names
pub fn probe_command() -> ExecCommand {
    ExecCommand::new(["which", MARIADB_TOOLS.dump])
}

pub fn tools_for(mariadb_tools_present: bool) -> MySqlTools {
    if mariadb_tools_present {
        MARIADB_TOOLS
    } else {
        MYSQL_TOOLS
    }
}

fn with_password(command: ExecCommand, credentials: &MySqlCredentials) -> ExecCommand {
    match &credentials.password {
        Some(password) => command.with_env(PASSWORD_ENV, password),
        None => command,
    }
}

pub fn list_databases_command(tools: MySqlTools, credentials: &MySqlCredentials) -> ExecCommand {
    let command = ExecCommand::new([
        tools.client.to_string(),
        format!("--user={}", credentials.user),
        "--batch".to_string(),
        "--skip-column-names".to_string(),
        "--execute".to_string(),
        "SHOW DATABASES".to_string(),
    ]);
    with_password(command, credentials)
}

/// User databases from `SHOW DATABASES` output, system schemas removed
pub fn parse_database_list(output: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .filter(|name| !SYSTEM_SCHEMAS.iter().any(|s| s.eq_ignore_ascii_case(name)))
        .map(String::from)
        .collect()
}

/// One consistent dump of every listed database, with routines and triggers
pub fn dump_command(
    tools: MySqlTools,
    credentials: &MySqlCredentials,
    databases: &[String],
) -> ExecCommand {
    let mut argv = vec![
        tools.dump.to_string(),
        format!("--user={}", credentials.user),
        "--single-transaction".to_string(),
        "--routines".to_string(),
        "--triggers".to_string(),
        "--databases".to_string(),
        "--".to_string(),
    ];
    argv.extend(databases.iter().cloned());
    with_password(ExecCommand::new(argv), credentials)
}
