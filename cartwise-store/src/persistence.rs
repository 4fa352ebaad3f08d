//! On-disk locations and JSON files.
//!
//! The fallback key-value file and the configuration file are both written
//! here: atomically through a sibling temp file, readable by the owner only.

use serde::{de::DeserializeOwned, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::StoreError;

/// Owner read/write.
const FILE_MODE: u32 = 0o600;

/// Owner read/write/search.
const DIR_MODE: u32 = 0o700;

/// Where the database and fallback file live: the platform data directory
/// (`~/.local/share/cartwise`, `~/Library/Application Support/cartwise`,
/// `%APPDATA%\cartwise`), or the working directory when there is none.
pub fn default_data_dir() -> PathBuf {
    dirs::data_dir().map_or_else(|| PathBuf::from("."), |dir| dir.join("cartwise"))
}

/// Where `config.json` lives by default.
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir().map_or_else(default_data_dir, |dir| dir.join("cartwise"))
}

/// `config.json` under [`default_config_dir`].
pub fn default_config_path() -> PathBuf {
    default_config_dir().join("config.json")
}

/// Narrows `path` to `mode`. A no-op off Unix.
async fn restrict(path: &Path, mode: u32) -> Result<(), StoreError> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(mode)).await?;
        debug!(path = %path.display(), mode = %format!("{mode:o}"), "Permissions restricted");
    }
    #[cfg(not(unix))]
    let _ = (path, mode);
    Ok(())
}

/// Creates `path` and any missing parents, owner-only.
pub async fn ensure_dir(path: &Path) -> Result<(), StoreError> {
    if path.as_os_str().is_empty() || path.exists() {
        return Ok(());
    }
    debug!(path = %path.display(), "Creating directory");
    tokio::fs::create_dir_all(path).await?;
    restrict(path, DIR_MODE).await
}

/// Writes `data` as pretty JSON, replacing the file atomically.
pub async fn save_json<T: Serialize + ?Sized>(path: &Path, data: &T) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent).await?;
    }
    let json = serde_json::to_string_pretty(data)?;
    let staging = path.with_extension("json.tmp");
    tokio::fs::write(&staging, json).await?;
    tokio::fs::rename(&staging, path).await?;
    restrict(path, FILE_MODE).await?;
    debug!(path = %path.display(), "Saved");
    Ok(())
}

/// Reads a JSON file.
pub async fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T, StoreError> {
    let content = tokio::fs::read_to_string(path).await?;
    Ok(serde_json::from_str(&content)?)
}

/// Reads a JSON file, falling back to `T::default()`. A missing file is
/// silent; a corrupt one is logged.
pub async fn load_json_or_default<T: DeserializeOwned + Default>(path: &Path) -> T {
    match load_json(path).await {
        Ok(data) => data,
        Err(StoreError::Io(_)) => T::default(),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Unreadable file, starting empty");
            T::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_paths() {
        assert!(!default_data_dir().as_os_str().is_empty());
        assert!(default_config_path().ends_with("config.json"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_saved_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = tempfile::tempdir().unwrap();
        let file = temp_dir.path().join("state").join("fallback.json");

        save_json(&file, &serde_json::json!({ "a": "1" })).await.unwrap();

        let file_mode = std::fs::metadata(&file).unwrap().permissions().mode() & 0o777;
        let dir_mode = std::fs::metadata(file.parent().unwrap())
            .unwrap()
            .permissions()
            .mode()
            & 0o777;
        assert_eq!(file_mode, 0o600);
        assert_eq!(dir_mode, 0o700);
    }
}
