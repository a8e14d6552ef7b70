//! Test fixtures and sample data
//!
//! Container descriptions as `docker inspect` would report them for the
//! database images the tool recognises, plus a few it must ignore.

use db_auto_backup::utils::ContainerInfo;
use std::collections::HashMap;

/// A running container with the given image and environment
pub fn container(id: &str, name: &str, image: &str, env: &[(&str, &str)]) -> ContainerInfo {
    ContainerInfo {
        id: id.to_string(),
        name: name.to_string(),
        image: image.to_string(),
        env: env
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
        labels: HashMap::new(),
    }
}

/// Add a label to a container fixture
pub fn with_label(mut container: ContainerInfo, key: &str, value: &str) -> ContainerInfo {
    container.labels.insert(key.to_string(), value.to_string());
    container
}

pub fn postgres_container(id: &str, name: &str) -> ContainerInfo {
    container(
        id,
        name,
        "postgres:16-alpine",
        &[
            ("POSTGRES_USER", "app"),
            ("POSTGRES_PASSWORD", "pg-secret"),
            ("PG_MAJOR", "16"),
        ],
    )
}

pub fn mysql_container(id: &str, name: &str) -> ContainerInfo {
    container(
        id,
        name,
        "mysql:8.0",
        &[("MYSQL_ROOT_PASSWORD", "root-secret"), ("MYSQL_MAJOR", "8.0")],
    )
}

pub fn mariadb_container(id: &str, name: &str) -> ContainerInfo {
    container(
        id,
        name,
        "mariadb:11",
        &[
            ("MARIADB_USER", "app"),
            ("MARIADB_PASSWORD", "maria-secret"),
            ("MARIADB_VERSION", "11.2.2"),
        ],
    )
}

pub fn redis_container(id: &str, name: &str) -> ContainerInfo {
    container(id, name, "redis:7", &[("REDIS_VERSION", "7.2.4")])
}

/// A container no engine rule matches
pub fn nginx_container(id: &str, name: &str) -> ContainerInfo {
    container(id, name, "nginx:latest", &[("NGINX_VERSION", "1.25.3")])
}

/// SQL text a scripted dump produces for a named container
pub fn sample_dump(name: &str) -> Vec<u8> {
    format!(
        "-- dump of {name}\nCREATE TABLE items (id integer primary key);\nINSERT INTO items VALUES (1), (2), (3);\n"
    )
    .into_bytes()
}

/// `SHOW DATABASES` output including the system schemas
pub fn mysql_database_list(user_dbs: &[&str]) -> String {
    let mut lines = vec!["information_schema", "mysql", "performance_schema", "sys"];
    lines.extend_from_slice(user_dbs);
    let mut out = lines.join("\n");
    out.push('\n');
    out
}
