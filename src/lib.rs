//! DB Auto Backup Library
//!
//! Finds database containers on a Docker host, dumps each one from inside its
//! container and stores the result locally and optionally in S3, once or on a
//! cron schedule.

pub mod config;
pub mod engines;
pub mod managers;
pub mod utils;

// Re-export commonly used types
pub use config::{load_config, Config, ConfigError};
pub use engines::EngineKind;
pub use managers::backup::{BackupManager, RunReport, TargetOutcome};
pub use managers::discovery::{BackupTarget, Discovery};
pub use managers::dump::TargetError;
pub use managers::logging::{init_console_logging, init_logging, LogCapture, LogGuard, LoggingConfig};
pub use managers::notification::NotificationManager;
pub use managers::pipeline::Artifact;
pub use managers::scheduler::{Scheduler, SchedulerState};
