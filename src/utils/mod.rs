pub mod command;
pub mod compression;
pub mod cron;
pub mod docker;
pub mod locker;

// Trait-based abstractions for testability
pub mod docker_ops;
pub mod s3;

// Re-export commonly used types and traits (used by test crate)
pub use compression::Compression;
pub use docker_ops::{ContainerInfo, ContainerRuntime, DockerCli, ExecCommand, ExecOutput, RuntimeError};
pub use s3::{ObjectStore, S3Store};
