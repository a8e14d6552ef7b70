//! Test context and harness for whole-run tests
//!
//! Wires a `BackupManager` to the mock runtime, object store and hook
//! transport so a test can script containers and inspect every side effect.

use crate::config_builder::ConfigBuilder;
use anyhow::Result;
use db_auto_backup::config::Config;
use db_auto_backup::managers::notification::mock::MockTransport;
use db_auto_backup::utils::docker_ops::mock::MockRuntime;
use db_auto_backup::utils::s3::mock::MockObjectStore;
use db_auto_backup::{BackupManager, NotificationManager};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

/// Test context that owns the temp dir and the mocks of one test
pub struct TestContext {
    temp_dir: TempDir,
    config: Arc<Config>,
    store: MockObjectStore,
    transport: MockTransport,
}

impl TestContext {
    /// Context with the default test configuration
    pub fn new() -> Self {
        Self::from_builder(ConfigBuilder::new())
    }

    /// Context from a ConfigBuilder
    pub fn from_builder(builder: ConfigBuilder) -> Self {
        let (config, temp_dir) = builder.persist();
        Self {
            temp_dir,
            config: Arc::new(config),
            store: MockObjectStore::new(),
            transport: MockTransport::new(),
        }
    }

    /// Replace the object store, e.g. with one that fails uploads
    pub fn with_store(mut self, store: MockObjectStore) -> Self {
        self.store = store;
        self
    }

    /// Replace the hook transport
    pub fn with_transport(mut self, transport: MockTransport) -> Self {
        self.transport = transport;
        self
    }

    /// A fresh mock runtime to script containers on
    pub fn runtime(&self) -> MockRuntime {
        MockRuntime::new()
    }

    /// Manager wired to `runtime` and this context's store and transport.
    /// The store is only attached when S3 is enabled in the config.
    pub fn manager(&self, runtime: MockRuntime) -> BackupManager {
        let notifier = NotificationManager::with_transport(
            &self.config.hooks,
            Arc::new(self.transport.clone()),
        );
        let manager = BackupManager::new(Arc::clone(&self.config), Arc::new(runtime))
            .with_notification_manager(notifier);

        if self.config.s3.enabled {
            manager.with_object_store(Arc::new(self.store.clone()))
        } else {
            manager
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn backup_dir(&self) -> &Path {
        &self.config.backup_dir
    }

    pub fn store(&self) -> &MockObjectStore {
        &self.store
    }

    pub fn transport(&self) -> &MockTransport {
        &self.transport
    }

    /// Get the temporary directory path
    pub fn temp_dir(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Names of the regular files currently in the backup directory,
    /// excluding the lock file
    pub fn backup_files(&self) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(self.backup_dir())
            .map(|entries| {
                entries
                    .filter_map(|e| e.ok())
                    .filter(|e| e.path().is_file())
                    .map(|e| e.file_name().to_string_lossy().into_owned())
                    .filter(|name| name != ".db-auto-backup.lock")
                    .collect()
            })
            .unwrap_or_default();
        names.sort();
        names
    }

    pub fn backup_path(&self, name: &str) -> PathBuf {
        self.backup_dir().join(name)
    }

    /// Read a file from the backup directory
    pub fn read_backup(&self, name: &str) -> Result<Vec<u8>> {
        Ok(std::fs::read(self.backup_path(name))?)
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Extension trait for assertion helpers
pub trait ResultAssertions<T> {
    /// Assert that the result is Ok and return the value
    fn assert_ok(self) -> T;

    /// Assert that the result is Ok with a custom message
    fn assert_ok_msg(self, msg: &str) -> T;

    /// Assert that the result is Err
    fn assert_err(self);

    /// Assert that the result is Err and its message contains `needle`
    fn assert_err_contains(self, needle: &str);
}

impl<T: std::fmt::Debug, E: std::fmt::Display> ResultAssertions<T> for Result<T, E> {
    fn assert_ok(self) -> T {
        match self {
            Ok(v) => v,
            Err(e) => panic!("Expected Ok, got Err: {}", e),
        }
    }

    fn assert_ok_msg(self, msg: &str) -> T {
        match self {
            Ok(v) => v,
            Err(e) => panic!("{}: {}", msg, e),
        }
    }

    fn assert_err(self) {
        if let Ok(v) = self {
            panic!("Expected Err, got Ok: {:?}", v);
        }
    }

    fn assert_err_contains(self, needle: &str) {
        match self {
            Ok(v) => panic!("Expected Err containing '{}', got Ok: {:?}", needle, v),
            Err(e) => {
                let err_msg = e.to_string();
                assert!(
                    err_msg.contains(needle),
                    "Error '{}' does not contain '{}'",
                    err_msg,
                    needle
                );
            }
        }
    }
}

/// Extension trait for Option assertions
pub trait OptionAssertions<T> {
    /// Assert that the option is Some and return the value
    fn assert_some(self) -> T;

    /// Assert that the option is None
    fn assert_none(self);
}

impl<T: std::fmt::Debug> OptionAssertions<T> for Option<T> {
    fn assert_some(self) -> T {
        match self {
            Some(v) => v,
            None => panic!("Expected Some, got None"),
        }
    }

    fn assert_none(self) {
        if let Some(v) = self {
            panic!("Expected None, got Some: {:?}", v);
        }
    }
}
