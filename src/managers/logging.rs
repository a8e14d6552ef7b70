//! Logging manager with file rotation
//!
//! Provides up to three outputs:
//! - Console: configured level, concise format
//! - File: daily rotation, only when a log directory is configured
//! - Capture: an in-memory copy of the current run's log lines, attached to
//!   the end-of-run hook when log inclusion is enabled

use crate::config::{expand_tilde, LogSettings};
use anyhow::{Context, Result};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

const LOG_FILE_PREFIX: &str = "db-auto-backup.log";

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Directory for log files; console only when unset
    pub log_directory: Option<PathBuf>,
    pub log_level: Level,
    /// Maximum number of log files to keep
    pub max_files: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_directory: None,
            log_level: Level::INFO,
            max_files: 10,
        }
    }
}

impl LoggingConfig {
    /// Create from configuration values
    pub fn from_settings(settings: &LogSettings) -> Self {
        Self {
            log_directory: settings.directory.as_deref().map(expand_tilde),
            log_level: parse_level(&settings.level),
            max_files: settings.max_files,
        }
    }
}

fn parse_level(level: &str) -> Level {
    match level.trim().to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" | "warning" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

/// In-memory sink for the log lines of one run.
///
/// Nothing is recorded until [`LogCapture::begin`] is called; [`LogCapture::take`]
/// returns what was collected and stops recording.
#[derive(Clone, Default)]
pub struct LogCapture {
    buffer: Arc<Mutex<Option<Vec<u8>>>>,
}

impl LogCapture {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start recording, discarding anything left from a previous run
    pub fn begin(&self) {
        if let Ok(mut buffer) = self.buffer.lock() {
            *buffer = Some(Vec::new());
        }
    }

    /// Stop recording and return the captured text
    pub fn take(&self) -> Option<String> {
        let bytes = self.buffer.lock().ok()?.take()?;
        Some(String::from_utf8_lossy(&bytes).into_owned())
    }
}

/// Writer handed out by [`LogCapture`] for each log event
pub struct CaptureWriter {
    buffer: Arc<Mutex<Option<Vec<u8>>>>,
}

impl Write for CaptureWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if let Ok(mut guard) = self.buffer.lock() {
            if let Some(buffer) = guard.as_mut() {
                buffer.extend_from_slice(buf);
            }
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogCapture {
    type Writer = CaptureWriter;

    fn make_writer(&'a self) -> Self::Writer {
        CaptureWriter {
            buffer: Arc::clone(&self.buffer),
        }
    }
}

/// Initialize logging with console, optional file and optional capture outputs
///
/// Returns a guard that must be kept alive for the duration of the program.
/// When the guard is dropped, any remaining logs are flushed to disk.
pub fn init_logging(config: &LoggingConfig, capture: Option<LogCapture>) -> Result<LogGuard> {
    let mut file_guard = None;

    let file_layer = match &config.log_directory {
        Some(log_dir) => {
            fs::create_dir_all(log_dir)
                .with_context(|| format!("Failed to create log directory: {:?}", log_dir))?;

            cleanup_old_logs(log_dir, config.max_files)?;

            let file_appender = RollingFileAppender::new(Rotation::DAILY, log_dir, LOG_FILE_PREFIX);
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            file_guard = Some(guard);

            Some(
                fmt::layer()
                    .with_writer(non_blocking)
                    .with_ansi(false)
                    .with_target(true)
                    .with_level(true)
                    .with_span_events(FmtSpan::NONE)
                    .with_filter(level_filter(config.log_level)),
            )
        }
        None => None,
    };

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(true)
        .with_target(false)
        .with_level(true)
        .with_span_events(FmtSpan::NONE)
        .with_filter(level_filter(config.log_level));

    let capture_layer = capture.map(|capture| {
        fmt::layer()
            .with_writer(capture)
            .with_ansi(false)
            .with_target(false)
            .with_level(true)
            .with_filter(level_filter(config.log_level))
    });

    tracing_subscriber::registry()
        .with(file_layer)
        .with(console_layer)
        .with(capture_layer)
        .try_init()
        .context("Failed to initialize logging")?;

    Ok(LogGuard {
        _file_guard: file_guard,
    })
}

/// Initialize simple console-only logging (for when config isn't available)
pub fn init_console_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    // A subscriber may already be installed (tests); that is fine.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(true)
        .try_init();
}

/// `RUST_LOG` wins over the configured level
fn level_filter(level: Level) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(level).into())
        .from_env_lossy()
}

/// Cleanup old log files, keeping only the most recent N files
fn cleanup_old_logs(log_dir: &Path, max_files: usize) -> Result<()> {
    let mut log_files: Vec<_> = fs::read_dir(log_dir)
        .with_context(|| format!("Failed to read log directory: {:?}", log_dir))?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_name().to_string_lossy().starts_with(LOG_FILE_PREFIX))
        .collect();

    // Newest first
    log_files.sort_by(|a, b| {
        let a_time = a.metadata().and_then(|m| m.modified()).ok();
        let b_time = b.metadata().and_then(|m| m.modified()).ok();
        b_time.cmp(&a_time)
    });

    for file in log_files.into_iter().skip(max_files) {
        if let Err(e) = fs::remove_file(file.path()) {
            tracing::warn!("Failed to remove old log file {:?}: {}", file.path(), e);
        } else {
            tracing::debug!("Removed old log file: {:?}", file.path());
        }
    }

    Ok(())
}

/// Guard that keeps the logging system alive
///
/// When dropped, flushes any remaining logs to disk.
pub struct LogGuard {
    _file_guard: Option<WorkerGuard>,
}
