//! Container discovery
//!
//! Turns the runtime's list of running containers into backup targets. The
//! result is a snapshot: containers started after the listing are picked up
//! by the next run.

use crate::config::parse_flag;
use crate::engines::{self, ConnectionParams, EngineKind};
use crate::utils::{ContainerInfo, ContainerRuntime, RuntimeError};
use std::fmt;
use tracing::{debug, info};

/// Label that opts a container out when set to a false-y value
pub const OPT_OUT_LABEL: &str = "db-auto-backup.enable";
/// Environment variable with the same meaning as [`OPT_OUT_LABEL`]
pub const OPT_OUT_ENV: &str = "DB_AUTO_BACKUP_ENABLE";

/// A container classified as a backable database
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupTarget {
    pub container_id: String,
    pub container_name: String,
    pub image: String,
    pub engine: EngineKind,
    pub params: ConnectionParams,
    /// File name stem, before any timestamp or extension
    pub base_name: String,
}

impl BackupTarget {
    pub fn short_id(&self) -> &str {
        let end = self
            .container_id
            .char_indices()
            .nth(12)
            .map_or(self.container_id.len(), |(i, _)| i);
        &self.container_id[..end]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    OptedOut,
    UnknownEngine,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::OptedOut => f.write_str("opted out"),
            SkipReason::UnknownEngine => f.write_str("no matching database engine"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedContainer {
    pub name: String,
    pub image: String,
    pub reason: SkipReason,
}

/// Outcome of one discovery pass
#[derive(Debug, Clone, Default)]
pub struct Discovery {
    /// Targets ordered by container name
    pub targets: Vec<BackupTarget>,
    pub skipped: Vec<SkippedContainer>,
    pub containers_seen: usize,
}

/// List running containers and classify each one
pub fn discover(runtime: &dyn ContainerRuntime) -> Result<Discovery, RuntimeError> {
    let containers = runtime.list_running()?;
    let mut discovery = Discovery {
        containers_seen: containers.len(),
        ..Default::default()
    };

    for container in &containers {
        match classify(container) {
            Ok(target) => {
                debug!(
                    "Container {} ({}) is a {} database",
                    target.container_name, target.image, target.engine
                );
                discovery.targets.push(target);
            }
            Err(reason) => {
                info!("Skipping container {} ({}): {}", container.name, container.image, reason);
                discovery.skipped.push(SkippedContainer {
                    name: container.name.clone(),
                    image: container.image.clone(),
                    reason,
                });
            }
        }
    }

    discovery
        .targets
        .sort_by(|a, b| a.container_name.cmp(&b.container_name).then(a.container_id.cmp(&b.container_id)));

    info!(
        "Found {} running containers, {} to back up",
        discovery.containers_seen,
        discovery.targets.len()
    );

    Ok(discovery)
}

/// Classify one container; opt-out is checked before any engine matching
pub fn classify(container: &ContainerInfo) -> Result<BackupTarget, SkipReason> {
    if is_opted_out(container) {
        return Err(SkipReason::OptedOut);
    }

    let descriptor =
        engines::match_engine(&container.image, &container.env).ok_or(SkipReason::UnknownEngine)?;

    Ok(BackupTarget {
        container_id: container.id.clone(),
        container_name: container.name.clone(),
        image: container.image.clone(),
        engine: descriptor.kind,
        params: engines::extract_params(descriptor.kind, &container.env),
        base_name: sanitize_name(&container.name),
    })
}

/// An explicit false-y opt-out marker on the label or the environment
pub fn is_opted_out(container: &ContainerInfo) -> bool {
    [
        container.labels.get(OPT_OUT_LABEL),
        container.env.get(OPT_OUT_ENV),
    ]
    .into_iter()
    .flatten()
    .any(|value| !parse_flag(value))
}

/// Keep file names portable: anything outside `[A-Za-z0-9._-]` becomes `_`
fn sanitize_name(name: &str) -> String {
    let sanitized: String = name
        .trim_start_matches('/')
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();

    let sanitized = sanitized.trim_start_matches('.').to_string();
    if sanitized.is_empty() {
        "container".to_string()
    } else {
        sanitized
    }
}
