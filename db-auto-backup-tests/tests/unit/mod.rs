//! Unit tests against the public API of db-auto-backup

mod config;
mod discovery;
mod dump;
