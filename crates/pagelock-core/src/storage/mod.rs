mod config;
pub mod sqlite;
pub mod store;

pub use config::{
    BootstrapConfig, Config, CoordinatorConfig, CountdownConfig, NavigationConfig, RescanMode,
};
pub use sqlite::SqliteStore;
pub use store::{MemoryStore, RecordStore};

use std::path::PathBuf;

use crate::error::StorageError;

/// Returns `~/.config/pagelock[-dev]/` based on PAGELOCK_ENV.
///
/// Set PAGELOCK_ENV=dev to use the development data directory.
///
/// # Errors
/// Returns an error if creating the config directory fails.
pub fn data_dir() -> Result<PathBuf, StorageError> {
    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("PAGELOCK_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("pagelock-dev")
    } else {
        base_dir.join("pagelock")
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
