//! Test utilities for db-auto-backup
//!
//! Shared builders, container fixtures and a harness that wires a
//! `BackupManager` to the mock runtime, object store and hook transport.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use test_utils::{fixtures, ConfigBuilder, TestContext};
//!
//! #[tokio::test]
//! async fn my_test() {
//!     let ctx = TestContext::from_builder(ConfigBuilder::new().with_success_url("http://hook/ok"));
//!     let runtime = ctx.runtime().with_container(fixtures::postgres_container("pg1", "app-db"));
//!     let report = ctx.manager(runtime).run_once().await;
//!     assert!(report.success());
//! }
//! ```

pub mod config_builder;
pub mod fixtures;
pub mod test_context;

// Re-export commonly used items
pub use config_builder::ConfigBuilder;
pub use test_context::{OptionAssertions, ResultAssertions, TestContext};

// Re-export types from the main crate for convenience
pub use db_auto_backup::config::{
    Config, HookConfig, LogSettings, S3Config, TimestampConfig, TimestampOrder,
};
pub use db_auto_backup::utils::{Compression, ContainerInfo, ContainerRuntime, ObjectStore};
pub use db_auto_backup::{BackupManager, EngineKind, RunReport, TargetError};

// Re-export mock implementations from the main crate
pub use db_auto_backup::managers::notification::mock::MockTransport;
pub use db_auto_backup::managers::notification::{HookMethod, HookRequest};
pub use db_auto_backup::utils::docker_ops::mock::{ExecCall, MockExec, MockRuntime};
pub use db_auto_backup::utils::s3::mock::{MockObjectStore, Upload};

/// Common test result type
pub type TestResult<T = ()> = anyhow::Result<T>;
