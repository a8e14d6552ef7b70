use crate::utils::Compression;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Directory the finished backup files are written to
    #[serde(default = "default_backup_dir")]
    pub backup_dir: PathBuf,

    /// Cron expression; empty means run once and exit
    #[serde(default)]
    pub schedule: String,

    #[serde(default)]
    pub compression: Compression,

    /// Upper bound on targets processed at the same time
    #[serde(default = "default_max_parallel")]
    pub max_parallel: usize,

    /// Wall-clock limit for all exec steps of one target
    #[serde(default = "default_dump_timeout")]
    pub dump_timeout_seconds: u64,

    /// Docker CLI used to talk to the container runtime
    #[serde(default = "default_docker_binary")]
    pub docker_binary: String,

    #[serde(default)]
    pub timestamp: TimestampConfig,

    #[serde(default)]
    pub hooks: HookConfig,

    #[serde(default)]
    pub s3: S3Config,

    #[serde(default)]
    pub logging: LogSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backup_dir: default_backup_dir(),
            schedule: String::new(),
            compression: Compression::default(),
            max_parallel: default_max_parallel(),
            dump_timeout_seconds: default_dump_timeout(),
            docker_binary: default_docker_binary(),
            timestamp: TimestampConfig::default(),
            hooks: HookConfig::default(),
            s3: S3Config::default(),
            logging: LogSettings::default(),
        }
    }
}

impl Config {
    /// The configured schedule, if any
    pub fn schedule(&self) -> Option<&str> {
        let schedule = self.schedule.trim();
        (!schedule.is_empty()).then_some(schedule)
    }

    pub fn dump_timeout(&self) -> Duration {
        Duration::from_secs(self.dump_timeout_seconds)
    }
}

/// Where the timestamp goes relative to the base name
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TimestampOrder {
    Before,
    #[default]
    After,
}

impl FromStr for TimestampOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "before" => Ok(TimestampOrder::Before),
            "after" => Ok(TimestampOrder::After),
            other => Err(format!(
                "Unknown timestamp order '{}' (expected before or after)",
                other
            )),
        }
    }
}

impl fmt::Display for TimestampOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimestampOrder::Before => f.write_str("before"),
            TimestampOrder::After => f.write_str("after"),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TimestampConfig {
    #[serde(default)]
    pub enabled: bool,

    /// strftime format applied to the run's start time
    #[serde(default = "default_timestamp_format")]
    pub format: String,

    #[serde(default)]
    pub order: TimestampOrder,
}

impl Default for TimestampConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            format: default_timestamp_format(),
            order: TimestampOrder::default(),
        }
    }
}

/// End-of-run notification settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HookConfig {
    #[serde(default)]
    pub success_url: Option<String>,

    #[serde(default)]
    pub failure_url: Option<String>,

    /// Healthchecks.io check id
    #[serde(default)]
    pub healthchecks_id: Option<String>,

    #[serde(default = "default_healthchecks_host")]
    pub healthchecks_host: String,

    /// Uptime Kuma push URL
    #[serde(default)]
    pub uptime_kuma_url: Option<String>,

    /// Attach the run's log output to the hook call
    #[serde(default)]
    pub include_logs: bool,

    #[serde(default = "default_hook_timeout")]
    pub timeout_seconds: u64,
}

impl Default for HookConfig {
    fn default() -> Self {
        Self {
            success_url: None,
            failure_url: None,
            healthchecks_id: None,
            healthchecks_host: default_healthchecks_host(),
            uptime_kuma_url: None,
            include_logs: false,
            timeout_seconds: default_hook_timeout(),
        }
    }
}

impl HookConfig {
    fn healthchecks_url(&self) -> Option<String> {
        let id = self.healthchecks_id.as_deref().map(str::trim).filter(|id| !id.is_empty())?;
        let host = self.healthchecks_host.trim().trim_end_matches('/');
        Some(format!("https://{}/{}", host, id))
    }

    /// Explicit success URL, else Healthchecks, else Uptime Kuma
    pub fn success_url(&self) -> Option<String> {
        non_empty(&self.success_url)
            .or_else(|| self.healthchecks_url())
            .or_else(|| non_empty(&self.uptime_kuma_url))
    }

    /// Explicit failure URL, else the Healthchecks `/fail` endpoint, else the
    /// success URL
    pub fn failure_url(&self) -> Option<String> {
        if let Some(url) = non_empty(&self.failure_url) {
            return Some(url);
        }
        if non_empty(&self.success_url).is_none() {
            if let Some(url) = self.healthchecks_url() {
                return Some(format!("{}/fail", url));
            }
        }
        self.success_url()
    }

    pub fn is_configured(&self) -> bool {
        self.success_url().is_some() || self.failure_url().is_some()
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
}

/// S3-compatible object storage settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct S3Config {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub endpoint: Option<String>,

    #[serde(default)]
    pub bucket: Option<String>,

    #[serde(default)]
    pub access_key: Option<String>,

    #[serde(default, skip_serializing)]
    pub secret_key: Option<String>,

    #[serde(default = "default_s3_region")]
    pub region: String,

    /// Key prefix; objects land at `<prefix>/<file name>`
    #[serde(default = "default_s3_prefix")]
    pub prefix: String,

    /// Keep the local file after a successful upload
    #[serde(default = "default_keep_local")]
    pub keep_local: bool,
}

impl Default for S3Config {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: None,
            bucket: None,
            access_key: None,
            secret_key: None,
            region: default_s3_region(),
            prefix: default_s3_prefix(),
            keep_local: default_keep_local(),
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LogSettings {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Also write daily rotated log files here
    #[serde(default)]
    pub directory: Option<PathBuf>,

    #[serde(default = "default_log_max_files")]
    pub max_files: usize,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            directory: None,
            max_files: default_log_max_files(),
        }
    }
}

// Default value functions

pub(super) fn default_backup_dir() -> PathBuf { PathBuf::from("/var/backups") }
fn default_max_parallel() -> usize { 1 }
fn default_dump_timeout() -> u64 { 3600 }
fn default_docker_binary() -> String { "docker".to_string() }
pub(super) fn default_timestamp_format() -> String { "%Y-%m-%d_%H-%M".to_string() }
pub(super) fn default_healthchecks_host() -> String { "hc-ping.com".to_string() }
fn default_hook_timeout() -> u64 { 30 }
pub(super) fn default_s3_region() -> String { "us-east-1".to_string() }
pub(super) fn default_s3_prefix() -> String { "backups".to_string() }
fn default_keep_local() -> bool { true }
fn default_log_level() -> String { "info".to_string() }
fn default_log_max_files() -> usize { 10 }
