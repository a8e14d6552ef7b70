//! Whole backup runs against the mock runtime, object store and hooks
//!
//! Run with: `cargo test -p db-auto-backup-tests --test scenarios`

mod hooks;
mod pipeline;
mod scheduler;
