//! Path resolution utilities.

use crate::error::{KeyringError, Result};
use std::path::PathBuf;

/// Get the Strongbox base directory (~/.strongbox).
pub fn base_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().ok_or_else(|| {
        KeyringError::Storage("Could not determine home directory".to_string())
    })?;
    Ok(home.join(".strongbox"))
}

/// Get the default records directory (~/.strongbox/records).
pub fn records_dir() -> Result<PathBuf> {
    Ok(base_dir()?.join("records"))
}
