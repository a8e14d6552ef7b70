use super::types::*;
use super::expand_tilde;
use crate::utils::cron::{parse_schedule, ScheduleError};
use crate::utils::Compression;
use chrono::format::{Item, StrftimeItems};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error(transparent)]
    InvalidSchedule(#[from] ScheduleError),

    #[error("Invalid value for {variable}: {reason}")]
    InvalidValue { variable: String, reason: String },

    #[error("Validation error: {0}")]
    ValidationError(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Load and validate configuration from a TOML file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let contents = fs::read_to_string(path)?;
    let mut config: Config = toml::from_str(&contents)?;
    expand_paths(&mut config);
    validate_config(&config)?;
    Ok(config)
}

fn expand_paths(config: &mut Config) {
    config.backup_dir = expand_tilde(&config.backup_dir);
    if let Some(dir) = config.logging.directory.take() {
        config.logging.directory = Some(expand_tilde(&dir));
    }
}

impl Config {
    /// Load and validate configuration from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_vars(std::env::vars())
    }

    /// Build configuration from `NAME=value` pairs
    pub fn from_vars<I, K, V>(vars: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let vars: HashMap<String, String> = vars
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        let get = |name: &str| {
            vars.get(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let mut config = Config::default();

        if let Some(dir) = get("BACKUP_DIR") {
            config.backup_dir = expand_tilde(&PathBuf::from(dir));
        }
        if let Some(schedule) = get("SCHEDULE") {
            config.schedule = schedule;
        }
        if let Some(compression) = get("COMPRESSION") {
            config.compression = Compression::from_str(&compression).map_err(|e| {
                ConfigError::InvalidValue {
                    variable: "COMPRESSION".to_string(),
                    reason: e.to_string(),
                }
            })?;
        }
        if let Some(value) = get("MAX_PARALLEL") {
            config.max_parallel = parse_number("MAX_PARALLEL", &value)?;
        }
        if let Some(value) = get("DUMP_TIMEOUT_SECONDS") {
            config.dump_timeout_seconds = parse_number("DUMP_TIMEOUT_SECONDS", &value)?;
        }
        if let Some(binary) = get("DOCKER_BINARY") {
            config.docker_binary = binary;
        }

        if let Some(enabled) = get("TIMESTAMP") {
            config.timestamp.enabled = parse_flag(&enabled);
        }
        if let Some(format) = get("TIMESTAMP_FORMAT") {
            config.timestamp.format = format;
        }
        if let Some(order) = get("TIMESTAMP_ORDER") {
            config.timestamp.order =
                TimestampOrder::from_str(&order).map_err(|reason| ConfigError::InvalidValue {
                    variable: "TIMESTAMP_ORDER".to_string(),
                    reason,
                })?;
        }

        config.hooks.success_url = get("SUCCESS_HOOK_URL");
        config.hooks.failure_url = get("FAILURE_HOOK_URL");
        config.hooks.healthchecks_id = get("HEALTHCHECKS_ID");
        if let Some(host) = get("HEALTHCHECKS_HOST") {
            config.hooks.healthchecks_host = host;
        }
        config.hooks.uptime_kuma_url = get("UPTIME_KUMA_URL");
        if let Some(include) = get("INCLUDE_LOGS") {
            config.hooks.include_logs = parse_flag(&include);
        }

        if let Some(enabled) = get("S3_ENABLED") {
            config.s3.enabled = parse_flag(&enabled);
        }
        config.s3.endpoint = get("S3_ENDPOINT");
        config.s3.bucket = get("S3_BUCKET");
        config.s3.access_key = get("S3_ACCESS_KEY");
        config.s3.secret_key = get("S3_SECRET_KEY");
        if let Some(region) = get("S3_REGION") {
            config.s3.region = region;
        }
        if let Some(prefix) = vars.get("S3_PREFIX") {
            // An explicitly empty prefix puts objects at the bucket root
            config.s3.prefix = prefix.trim().to_string();
        }
        if let Some(keep) = get("S3_KEEP_LOCAL") {
            config.s3.keep_local = parse_flag(&keep);
        }

        if let Some(level) = get("LOG_LEVEL") {
            config.logging.level = level;
        }
        if let Some(dir) = get("LOG_DIRECTORY") {
            config.logging.directory = Some(expand_tilde(&PathBuf::from(dir)));
        }
        if let Some(value) = get("LOG_MAX_FILES") {
            config.logging.max_files = parse_number("LOG_MAX_FILES", &value)?;
        }

        validate_config(&config)?;
        Ok(config)
    }
}

/// A set flag is true unless it spells out a negative
pub fn parse_flag(value: &str) -> bool {
    let value = value.trim().to_ascii_lowercase();
    !value.is_empty() && !matches!(value.as_str(), "0" | "false" | "no" | "off")
}

fn parse_number<T>(variable: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.parse().map_err(|e: T::Err| ConfigError::InvalidValue {
        variable: variable.to_string(),
        reason: format!("'{}': {}", value, e),
    })
}

/// Validate the configuration
pub fn validate_config(config: &Config) -> Result<()> {
    if let Some(schedule) = config.schedule() {
        parse_schedule(schedule)?;
    }

    if config.max_parallel == 0 {
        return Err(ConfigError::ValidationError(
            "max_parallel must be at least 1".to_string(),
        ));
    }

    if config.dump_timeout_seconds == 0 {
        return Err(ConfigError::ValidationError(
            "dump_timeout_seconds must be greater than zero".to_string(),
        ));
    }

    if config.docker_binary.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "docker_binary must not be empty".to_string(),
        ));
    }

    if config.timestamp.enabled {
        validate_timestamp_format(&config.timestamp.format)?;
    }

    if config.s3.enabled {
        validate_s3(&config.s3)?;
    }

    Ok(())
}

fn validate_timestamp_format(format: &str) -> Result<()> {
    if format.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "Timestamp format must not be empty".to_string(),
        ));
    }

    if format.contains('/') {
        return Err(ConfigError::ValidationError(format!(
            "Timestamp format '{}' must not contain '/'",
            format
        )));
    }

    if StrftimeItems::new(format).any(|item| matches!(item, Item::Error)) {
        return Err(ConfigError::ValidationError(format!(
            "Invalid timestamp format '{}'",
            format
        )));
    }

    Ok(())
}

fn validate_s3(s3: &S3Config) -> Result<()> {
    let missing: Vec<&str> = [
        ("endpoint", &s3.endpoint),
        ("bucket", &s3.bucket),
        ("access_key", &s3.access_key),
        ("secret_key", &s3.secret_key),
    ]
    .into_iter()
    .filter(|(_, value)| value.as_deref().map_or(true, |v| v.trim().is_empty()))
    .map(|(name, _)| name)
    .collect();

    if !missing.is_empty() {
        return Err(ConfigError::ValidationError(format!(
            "S3 upload is enabled but these settings are missing: {}",
            missing.join(", ")
        )));
    }

    Ok(())
}
