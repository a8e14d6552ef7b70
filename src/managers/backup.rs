//! Backup manager - orchestrates one backup run across all targets

use super::discovery::{self, Discovery};
use super::dump::TargetError;
use super::logging::LogCapture;
use super::notification::{format_duration, NotificationManager};
use super::pipeline::{assign_file_names, Artifact, Pipeline};
use crate::config::Config;
use crate::engines::EngineKind;
use crate::utils::locker::RunLock;
use crate::utils::{ContainerRuntime, ObjectStore, RuntimeError};
use chrono::{DateTime, Local};
use std::fs;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tracing::{error, info, info_span, warn};

/// Result of one target
#[derive(Debug)]
pub struct TargetOutcome {
    pub target_name: String,
    pub container_id: String,
    pub engine: EngineKind,
    pub result: Result<Artifact, TargetError>,
    pub duration: Duration,
}

impl TargetOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Everything that happened during one run
#[derive(Debug)]
pub struct RunReport {
    pub started_at: DateTime<Local>,
    pub finished_at: DateTime<Local>,
    pub containers_seen: usize,
    /// One entry per discovered target, in discovery order
    pub outcomes: Vec<TargetOutcome>,
    /// Set when the run could not get as far as processing targets
    pub error: Option<String>,
}

impl RunReport {
    fn aborted(started_at: DateTime<Local>, error: String) -> Self {
        Self {
            started_at,
            finished_at: Local::now(),
            containers_seen: 0,
            outcomes: Vec::new(),
            error: Some(error),
        }
    }

    pub fn success(&self) -> bool {
        self.error.is_none() && self.outcomes.iter().all(TargetOutcome::is_success)
    }

    pub fn duration(&self) -> Duration {
        (self.finished_at - self.started_at).to_std().unwrap_or_default()
    }

    pub fn failures(&self) -> impl Iterator<Item = (&TargetOutcome, &TargetError)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().err().map(|e| (o, e)))
    }

    pub fn artifacts(&self) -> impl Iterator<Item = &Artifact> {
        self.outcomes.iter().filter_map(|o| o.result.as_ref().ok())
    }

    /// Human-readable warnings, currently zero-length dumps
    pub fn warnings(&self) -> Vec<String> {
        self.outcomes
            .iter()
            .filter_map(|o| match &o.result {
                Ok(artifact) if artifact.is_empty() => {
                    Some(format!("{}: empty dump written to {}", o.target_name, artifact.file_name))
                }
                _ => None,
            })
            .collect()
    }

    pub fn uploaded_count(&self) -> usize {
        self.artifacts().filter(|a| a.s3_key.is_some()).count()
    }

    /// One-line summary naming every failed target
    pub fn summary(&self) -> String {
        if let Some(error) = &self.error {
            return format!("Backup run failed: {}", error);
        }

        let succeeded = self.artifacts().count();
        let mut summary = format!(
            "Backed up {} of {} database container(s) in {}",
            succeeded,
            self.outcomes.len(),
            format_duration(self.duration().as_secs())
        );

        let uploaded = self.uploaded_count();
        if uploaded > 0 {
            summary.push_str(&format!(", uploaded {}", uploaded));
        }

        let failures: Vec<String> = self
            .failures()
            .map(|(outcome, error)| format!("{}: {}", outcome.target_name, error))
            .collect();
        if !failures.is_empty() {
            summary.push_str(&format!("; failed: {}", failures.join("; ")));
        }

        summary
    }
}

pub struct BackupManager {
    config: Arc<Config>,
    runtime: Arc<dyn ContainerRuntime>,
    store: Option<Arc<dyn ObjectStore>>,
    notifier: NotificationManager,
    log_capture: Option<LogCapture>,
}

impl BackupManager {
    /// Create a manager that notifies hooks over HTTP
    pub fn new(config: Arc<Config>, runtime: Arc<dyn ContainerRuntime>) -> Self {
        let notifier = NotificationManager::new(&config.hooks);
        Self {
            config,
            runtime,
            store: None,
            notifier,
            log_capture: None,
        }
    }

    pub fn with_object_store(mut self, store: Arc<dyn ObjectStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_notification_manager(mut self, notifier: NotificationManager) -> Self {
        self.notifier = notifier;
        self
    }

    /// Collect the run's log lines for the hook payload
    pub fn with_log_capture(mut self, capture: LogCapture) -> Self {
        self.log_capture = Some(capture);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// List targets without dumping anything
    pub async fn discover(&self) -> Result<Discovery, RuntimeError> {
        let runtime = Arc::clone(&self.runtime);
        tokio::task::spawn_blocking(move || discovery::discover(runtime.as_ref()))
            .await
            .map_err(|e| RuntimeError::Query(format!("Discovery task failed: {}", e)))?
    }

    /// Perform one complete run and notify the hook exactly once
    pub async fn run_once(&self) -> RunReport {
        let capture = self
            .log_capture
            .as_ref()
            .filter(|_| self.notifier.include_logs());
        if let Some(capture) = capture {
            capture.begin();
        }

        let started_at = Local::now();
        info!("Starting backup run");
        let report = self.execute(started_at).await;
        log_report(&report);

        let logs = capture.and_then(LogCapture::take);
        if let Some(request) = self.notifier.build_request(&report, logs) {
            let notifier = self.notifier.clone();
            if let Err(e) = tokio::task::spawn_blocking(move || notifier.deliver(&request)).await {
                warn!("Hook task failed: {}", e);
            }
        }

        report
    }

    async fn execute(&self, started_at: DateTime<Local>) -> RunReport {
        let backup_dir = &self.config.backup_dir;
        if let Err(e) = fs::create_dir_all(backup_dir) {
            return RunReport::aborted(
                started_at,
                format!("Failed to create backup directory {}: {}", backup_dir.display(), e),
            );
        }

        let mut lock = match RunLock::open(backup_dir) {
            Ok(lock) => lock,
            Err(e) => return RunReport::aborted(started_at, format!("{:#}", e)),
        };
        let _guard = match lock.try_acquire() {
            Ok(guard) => guard,
            Err(e) => return RunReport::aborted(started_at, format!("{:#}", e)),
        };

        let discovery = match self.discover().await {
            Ok(discovery) => discovery,
            Err(e) => return RunReport::aborted(started_at, format!("Container discovery failed: {}", e)),
        };

        let outcomes = self.process_targets(discovery.targets, &started_at).await;

        RunReport {
            started_at,
            finished_at: Local::now(),
            containers_seen: discovery.containers_seen,
            outcomes,
            error: None,
        }
    }

    /// Process every target with at most `max_parallel` in flight. Each
    /// target owns one result slot; a failure or panic only fills its own.
    async fn process_targets(
        &self,
        targets: Vec<discovery::BackupTarget>,
        started_at: &DateTime<Local>,
    ) -> Vec<TargetOutcome> {
        let file_names = assign_file_names(&targets, &self.config, started_at);
        let pipeline = Pipeline::new(
            Arc::clone(&self.config),
            Arc::clone(&self.runtime),
            self.store.clone(),
        );
        let semaphore = Arc::new(Semaphore::new(self.config.max_parallel.max(1)));

        let mut handles = Vec::with_capacity(targets.len());
        for (target, file_name) in targets.into_iter().zip(file_names) {
            let permit = Arc::clone(&semaphore).acquire_owned().await.ok();
            let pipeline = pipeline.clone();
            let task_target = target.clone();

            let handle = tokio::task::spawn_blocking(move || {
                let _permit = permit;
                let _span = info_span!("target", name = %task_target.container_name).entered();
                info!("Backing up {} ({}) to {}", task_target.container_name, task_target.engine, file_name);

                let started = Instant::now();
                let result = pipeline.process(&task_target, &file_name);
                if let Err(e) = &result {
                    error!("Backup of {} failed: {}", task_target.container_name, e);
                }
                (result, started.elapsed())
            });
            handles.push((target, handle));
        }

        let mut outcomes = Vec::with_capacity(handles.len());
        for (target, handle) in handles {
            let (result, duration) = match handle.await {
                Ok(done) => done,
                Err(e) => {
                    error!("Backup task for {} did not complete: {}", target.container_name, e);
                    (Err(TargetError::Panicked(panic_message(e))), Duration::ZERO)
                }
            };
            outcomes.push(TargetOutcome {
                target_name: target.container_name,
                container_id: target.container_id,
                engine: target.engine,
                result,
                duration,
            });
        }
        outcomes
    }
}

fn panic_message(error: tokio::task::JoinError) -> String {
    if !error.is_panic() {
        return error.to_string();
    }
    let payload = error.into_panic();
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn log_report(report: &RunReport) {
    for warning in report.warnings() {
        warn!("{}", warning);
    }
    if report.success() {
        info!("{}", report.summary());
    } else {
        error!("{}", report.summary());
    }
}
