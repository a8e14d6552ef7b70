//! Database engine registry
//!
//! Containers are classified by walking a fixed, ordered list of matchers;
//! the first one that accepts the container wins. Image-name matchers come
//! before environment-marker matchers, and within each group the more
//! specific flavours (MariaDB) come before the generic ones (MySQL).
//!
//! Environment markers catch derived images: a `FROM postgres` image pushed
//! under another name still inherits `PG_MAJOR` from its base.

pub mod mysql;
pub mod postgres;
pub mod redis;

use regex::Regex;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

pub use mysql::MySqlParams;
pub use postgres::PostgresParams;
pub use redis::RedisParams;

/// Database technology of a target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    Postgres,
    /// MySQL family, MariaDB flavour
    MariaDb,
    /// MySQL family, Oracle MySQL flavour
    MySql,
    Redis,
}

impl EngineKind {
    pub fn name(&self) -> &'static str {
        match self {
            EngineKind::Postgres => "postgres",
            EngineKind::MariaDb => "mariadb",
            EngineKind::MySql => "mysql",
            EngineKind::Redis => "redis",
        }
    }

    /// Extension of the uncompressed dump
    pub fn file_extension(&self) -> &'static str {
        match self {
            EngineKind::Postgres | EngineKind::MariaDb | EngineKind::MySql => "sql",
            EngineKind::Redis => "rdb",
        }
    }

    pub fn is_mysql_family(&self) -> bool {
        matches!(self, EngineKind::MariaDb | EngineKind::MySql)
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.name())
    }
}

/// How a descriptor recognises a container
#[derive(Debug, Clone, Copy)]
pub enum MatchRule {
    /// Glob patterns (`*` wildcard) over the normalised image name
    Image(&'static [&'static str]),
    /// Any of these variables is declared by the image
    EnvMarker(&'static [&'static str]),
}

/// One entry of the registry
#[derive(Debug, Clone, Copy)]
pub struct EngineDescriptor {
    pub kind: EngineKind,
    pub rule: MatchRule,
}

impl EngineDescriptor {
    /// Pure predicate over the normalised image name and environment
    pub fn matches(&self, image_name: &str, env: &HashMap<String, String>) -> bool {
        match self.rule {
            MatchRule::Image(patterns) => patterns.iter().any(|p| glob_matches(p, image_name)),
            MatchRule::EnvMarker(keys) => keys.iter().any(|k| env.contains_key(*k)),
        }
    }
}

static REGISTRY: [EngineDescriptor; 8] = [
    EngineDescriptor {
        kind: EngineKind::Postgres,
        rule: MatchRule::Image(&[
            "postgres",
            "tensorchord/pgvecto-rs",
            "nextcloud/aio-postgresql",
            "timescale/timescaledb*",
            "pgvector/pgvector",
            "postgis/postgis",
            "immich-app/postgres",
        ]),
    },
    EngineDescriptor {
        kind: EngineKind::MariaDb,
        rule: MatchRule::Image(&["mariadb", "linuxserver/mariadb", "yobasystems/alpine-mariadb"]),
    },
    EngineDescriptor {
        kind: EngineKind::MySql,
        rule: MatchRule::Image(&["mysql", "mysql/mysql-server", "percona", "percona/percona-server"]),
    },
    EngineDescriptor {
        kind: EngineKind::Redis,
        rule: MatchRule::Image(&["redis", "redis/redis-stack-server"]),
    },
    EngineDescriptor {
        kind: EngineKind::Postgres,
        rule: MatchRule::EnvMarker(&["PG_MAJOR", "PG_VERSION"]),
    },
    EngineDescriptor {
        kind: EngineKind::MariaDb,
        rule: MatchRule::EnvMarker(&["MARIADB_VERSION", "MARIADB_MAJOR"]),
    },
    EngineDescriptor {
        kind: EngineKind::MySql,
        rule: MatchRule::EnvMarker(&["MYSQL_MAJOR", "MYSQL_VERSION"]),
    },
    EngineDescriptor {
        kind: EngineKind::Redis,
        rule: MatchRule::EnvMarker(&["REDIS_VERSION"]),
    },
];

/// The ordered matcher list
pub fn registry() -> &'static [EngineDescriptor] {
    &REGISTRY
}

/// Classify a container by image reference and environment
pub fn match_engine(image: &str, env: &HashMap<String, String>) -> Option<&'static EngineDescriptor> {
    let name = image_name(image);
    registry().iter().find(|d| d.matches(&name, env))
}

/// Connection parameters extracted from a container's environment
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionParams {
    Postgres(PostgresParams),
    MySql(MySqlParams),
    Redis(RedisParams),
}

/// Apply the engine's extraction rule
pub fn extract_params(kind: EngineKind, env: &HashMap<String, String>) -> ConnectionParams {
    match kind {
        EngineKind::Postgres => ConnectionParams::Postgres(PostgresParams::from_env(env)),
        EngineKind::MariaDb | EngineKind::MySql => ConnectionParams::MySql(MySqlParams::from_env(env)),
        EngineKind::Redis => ConnectionParams::Redis(RedisParams::from_env(env)),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Unable to find {engine} credentials in the container environment (looked for {looked_for})")]
    MissingCredentials {
        engine: EngineKind,
        looked_for: String,
    },

    #[error("Failed to enumerate databases: {0}")]
    DatabaseListing(String),

    #[error("Redis snapshot failed: {0}")]
    SnapshotFailed(String),
}

/// Reduce an image reference to the repository path used for matching.
///
/// `docker.io/library/postgres:16@sha256:...` becomes `postgres` and
/// `ghcr.io/immich-app/postgres:14` becomes `immich-app/postgres`.
pub fn image_name(reference: &str) -> String {
    let without_digest = reference.split('@').next().unwrap_or(reference);

    let mut parts: Vec<&str> = without_digest.split('/').collect();
    if parts.len() > 1 && is_registry_host(parts[0]) {
        parts.remove(0);
    }

    let mut name = parts.join("/");
    if let Some(idx) = name.rfind(':') {
        if !name[idx..].contains('/') {
            name.truncate(idx);
        }
    }

    let name = name.strip_prefix("library/").map(String::from).unwrap_or(name);
    name.to_lowercase()
}

fn is_registry_host(component: &str) -> bool {
    component.contains('.') || component.contains(':') || component == "localhost"
}

fn glob_matches(pattern: &str, name: &str) -> bool {
    let regex = format!(
        "^{}$",
        pattern
            .split('*')
            .map(regex::escape)
            .collect::<Vec<_>>()
            .join(".*")
    );
    Regex::new(&regex).map(|re| re.is_match(name)).unwrap_or(false)
}
