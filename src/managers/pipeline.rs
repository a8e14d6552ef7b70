//! Post-processing pipeline: compress, name, persist atomically, upload

use super::discovery::BackupTarget;
use super::dump::{run_dump, TargetError};
use crate::config::{Config, TimestampConfig, TimestampOrder};
use crate::engines::EngineKind;
use crate::utils::s3::object_key;
use crate::utils::{Compression, ContainerRuntime, ObjectStore};
use chrono::{DateTime, Local};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

const TEMP_PREFIX: &str = ".auto-backup-";

/// A finished backup file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub file_name: String,
    /// Where the file lives; `None` once it was removed after upload
    pub local_path: Option<PathBuf>,
    /// Uncompressed dump size
    pub bytes: u64,
    pub s3_key: Option<String>,
}

impl Artifact {
    pub fn is_empty(&self) -> bool {
        self.bytes == 0
    }
}

/// Derive the file name for one target.
///
/// `<base>[__<timestamp>].<engine ext>[.<codec ext>]`, with the timestamp
/// before the base name when so configured.
pub fn backup_file_name(
    base: &str,
    engine: EngineKind,
    compression: Compression,
    timestamp: &TimestampConfig,
    run_started: &DateTime<Local>,
) -> String {
    let stem = if timestamp.enabled {
        let stamp = run_started.format(&timestamp.format).to_string();
        match timestamp.order {
            TimestampOrder::Before => format!("{}__{}", stamp, base),
            TimestampOrder::After => format!("{}__{}", base, stamp),
        }
    } else {
        base.to_string()
    };

    format!("{}.{}{}", stem, engine.file_extension(), compression.extension())
}

/// File names for every target of a run, in target order.
///
/// Targets sharing a base name get their short container id appended so no
/// two targets ever write the same file.
pub fn assign_file_names(
    targets: &[BackupTarget],
    config: &Config,
    run_started: &DateTime<Local>,
) -> Vec<String> {
    let mut base_counts: HashMap<&str, usize> = HashMap::new();
    for target in targets {
        *base_counts.entry(target.base_name.as_str()).or_default() += 1;
    }

    let mut used = HashSet::new();
    targets
        .iter()
        .map(|target| {
            let base = if base_counts[target.base_name.as_str()] > 1 {
                format!("{}-{}", target.base_name, target.short_id())
            } else {
                target.base_name.clone()
            };

            let mut name = file_name_for(&base, target, config, run_started);
            let mut suffix = 2;
            while !used.insert(name.clone()) {
                name = file_name_for(&format!("{}-{}", base, suffix), target, config, run_started);
                suffix += 1;
            }

            if base != target.base_name {
                warn!(
                    "Container name {} is used more than once, writing {}",
                    target.base_name, name
                );
            }
            name
        })
        .collect()
}

fn file_name_for(base: &str, target: &BackupTarget, config: &Config, run_started: &DateTime<Local>) -> String {
    backup_file_name(base, target.engine, config.compression, &config.timestamp, run_started)
}

/// Everything a target needs to go from container to finished file
#[derive(Clone)]
pub struct Pipeline {
    config: Arc<Config>,
    runtime: Arc<dyn ContainerRuntime>,
    store: Option<Arc<dyn ObjectStore>>,
}

impl Pipeline {
    pub fn new(
        config: Arc<Config>,
        runtime: Arc<dyn ContainerRuntime>,
        store: Option<Arc<dyn ObjectStore>>,
    ) -> Self {
        Self {
            config,
            runtime,
            store,
        }
    }

    /// Dump one target into `file_name`, then upload it if configured.
    ///
    /// Blocking; run on a blocking thread of the Tokio runtime.
    pub fn process(&self, target: &BackupTarget, file_name: &str) -> Result<Artifact, TargetError> {
        let backup_dir = &self.config.backup_dir;
        let destination = backup_dir.join(file_name);

        let bytes = self.write_local(target, backup_dir, &destination)?;
        if bytes == 0 {
            warn!("Dump of {} is empty, keeping zero-length {}", target.container_name, file_name);
        }
        info!("Wrote {} ({} bytes uncompressed)", destination.display(), bytes);

        let mut artifact = Artifact {
            file_name: file_name.to_string(),
            local_path: Some(destination.clone()),
            bytes,
            s3_key: None,
        };

        if let Some(store) = &self.store {
            let key = object_key(&self.config.s3.prefix, file_name);
            store
                .put_file(&key, &destination)
                .map_err(|e| TargetError::Upload {
                    key: key.clone(),
                    message: format!("{:#}", e),
                })?;
            info!("Uploaded {} as {}", file_name, key);
            artifact.s3_key = Some(key);

            if !self.config.s3.keep_local {
                match fs::remove_file(&destination) {
                    Ok(()) => {
                        debug!("Removed local copy {}", destination.display());
                        artifact.local_path = None;
                    }
                    Err(e) => warn!("Failed to remove local copy {}: {}", destination.display(), e),
                }
            }
        }

        Ok(artifact)
    }

    /// Stream the dump through the codec into a temporary file, then rename
    /// it into place. The temporary file is removed on any failure.
    fn write_local(
        &self,
        target: &BackupTarget,
        backup_dir: &Path,
        destination: &Path,
    ) -> Result<u64, TargetError> {
        let mut temp = tempfile::Builder::new()
            .prefix(TEMP_PREFIX)
            .tempfile_in(backup_dir)
            .map_err(write_error(backup_dir))?;
        let temp_path = temp.path().to_path_buf();

        let summary = {
            let mut encoder = self.config.compression.encoder(BufWriter::new(temp.as_file_mut()));
            let summary = run_dump(
                self.runtime.as_ref(),
                target,
                &mut encoder,
                self.config.dump_timeout(),
            )?;
            let mut writer = encoder.finish().map_err(write_error(&temp_path))?;
            writer.flush().map_err(write_error(&temp_path))?;
            summary
        };

        temp.as_file().sync_all().map_err(write_error(&temp_path))?;
        temp.persist(destination)
            .map_err(|e| TargetError::Write {
                path: destination.to_path_buf(),
                source: e.error,
            })?;

        Ok(summary.bytes)
    }
}

fn write_error(path: &Path) -> impl FnOnce(io::Error) -> TargetError {
    let path = path.to_path_buf();
    move |source| TargetError::Write { path, source }
}
