//! Configuration module for db-auto-backup
//!
//! Configuration comes either from a TOML file or from the process
//! environment. Both paths end in the same validation, and the result is
//! read-only for the lifetime of the process.
//!
//! ## Example Usage
//!
//! ```no_run
//! use db_auto_backup::config;
//!
//! let config = config::load_config("db-auto-backup.toml")?;
//! println!("Backups go to {:?}", config.backup_dir);
//! # Ok::<(), config::ConfigError>(())
//! ```

mod loader;
mod types;

pub use loader::{load_config, parse_flag, validate_config, ConfigError, Result};
pub use types::*;

/// Expand tilde (~) in path
pub fn expand_tilde(path: &std::path::Path) -> std::path::PathBuf {
    if let Ok(stripped) = path.strip_prefix("~") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    path.to_path_buf()
}
