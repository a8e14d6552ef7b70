//! Integration tests against a real Docker daemon
//!
//! Each test starts its own database container and runs a full backup.
//! Other database containers on the host are backed up too; assertions only
//! look at the test's own container.
//! Run with: `cargo test -p db-auto-backup-tests --test integration -- --ignored`

mod common;
