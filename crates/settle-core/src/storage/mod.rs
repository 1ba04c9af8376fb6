mod config;
pub mod database;
pub mod snapshot;

pub use config::Config;
pub use database::{CompletedActivity, Database, Stats};
pub use snapshot::{MemoryBackend, PersistedSnapshot, SnapshotBackend, SnapshotStore};

use std::path::PathBuf;

/// Returns `~/.config/settle[-dev]/` based on SETTLE_ENV.
///
/// Set SETTLE_ENV=dev to use development data directory.
///
/// # Errors
/// Returns an error if the home directory cannot be determined or if
/// creating the config directory fails.
pub fn data_dir() -> Result<PathBuf, Box<dyn std::error::Error>> {
    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("SETTLE_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("settle-dev")
    } else {
        base_dir.join("settle")
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
