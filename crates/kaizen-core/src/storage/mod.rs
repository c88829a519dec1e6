mod config;
pub mod database;
mod memory;
pub mod migrations;

pub use config::Config;
pub use database::{Database, SessionRecord};
pub use memory::MemoryStore;

use std::path::PathBuf;

use crate::error::CoreError;

/// Returns `~/.config/kaizen[-dev]/` based on KAIZEN_ENV.
///
/// Set KAIZEN_ENV=dev to use the development data directory. KAIZEN_DATA_DIR
/// overrides both and is used verbatim.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf, CoreError> {
    let dir = match std::env::var_os("KAIZEN_DATA_DIR") {
        Some(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");
            let env = std::env::var("KAIZEN_ENV").unwrap_or_else(|_| "production".to_string());
            if env == "dev" {
                base_dir.join("kaizen-dev")
            } else {
                base_dir.join("kaizen")
            }
        }
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
