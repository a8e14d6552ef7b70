//! Fluent API for building test configurations
//!
//! Every builder owns a temporary directory and points `backup_dir` into it.

use db_auto_backup::config::{Config, TimestampOrder};
use db_auto_backup::utils::Compression;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Builder for creating test configurations
pub struct ConfigBuilder {
    temp_dir: TempDir,
    config: Config,
}

impl ConfigBuilder {
    /// Plain compression, no timestamps, no hooks, no S3
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let backup_dir = temp_dir.path().join("backups");
        fs::create_dir_all(&backup_dir).expect("Failed to create backup dir");

        let mut config = Config::default();
        config.backup_dir = backup_dir;
        config.dump_timeout_seconds = 30;

        Self { temp_dir, config }
    }

    pub fn with_compression(mut self, compression: Compression) -> Self {
        self.config.compression = compression;
        self
    }

    pub fn with_max_parallel(mut self, max_parallel: usize) -> Self {
        self.config.max_parallel = max_parallel;
        self
    }

    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.config.dump_timeout_seconds = seconds;
        self
    }

    pub fn with_schedule(mut self, schedule: &str) -> Self {
        self.config.schedule = schedule.to_string();
        self
    }

    /// Enable timestamped file names
    pub fn with_timestamp(mut self, format: &str, order: TimestampOrder) -> Self {
        self.config.timestamp.enabled = true;
        self.config.timestamp.format = format.to_string();
        self.config.timestamp.order = order;
        self
    }

    pub fn with_success_url(mut self, url: &str) -> Self {
        self.config.hooks.success_url = Some(url.to_string());
        self
    }

    pub fn with_failure_url(mut self, url: &str) -> Self {
        self.config.hooks.failure_url = Some(url.to_string());
        self
    }

    pub fn with_include_logs(mut self) -> Self {
        self.config.hooks.include_logs = true;
        self
    }

    /// Enable S3 uploads with placeholder credentials
    pub fn with_s3(mut self, prefix: &str, keep_local: bool) -> Self {
        let s3 = &mut self.config.s3;
        s3.enabled = true;
        s3.endpoint = Some("http://minio.test:9000".to_string());
        s3.bucket = Some("db-backups".to_string());
        s3.access_key = Some("test-access".to_string());
        s3.secret_key = Some("test-secret".to_string());
        s3.prefix = prefix.to_string();
        s3.keep_local = keep_local;
        self
    }

    /// Point `backup_dir` at a path inside the temp dir that does not exist yet
    pub fn with_missing_backup_dir(mut self, name: &str) -> Self {
        self.config.backup_dir = self.temp_dir.path().join(name);
        self
    }

    /// Get the temp directory path
    pub fn temp_dir(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn backup_dir(&self) -> PathBuf {
        self.config.backup_dir.clone()
    }

    /// Build the Config; the temp dir is removed when the builder drops
    pub fn build(self) -> Config {
        self.config
    }

    /// Keep the temp directory alive alongside the config
    pub fn persist(self) -> (Config, TempDir) {
        (self.config, self.temp_dir)
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
