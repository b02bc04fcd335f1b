//! JSON state files and default locations.

use serde::{Serialize, de::DeserializeOwned};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::StoreError;

// ============================================================================
// Default Paths
// ============================================================================

/// Returns the default configuration directory.
///
/// - macOS: `~/Library/Application Support/Tributary`
/// - Linux: `~/.config/tributary`
/// - Windows: `%APPDATA%\tributary`
pub fn default_config_dir() -> PathBuf {
    #[cfg(target_os = "macos")]
    {
        dirs::home_dir()
            .map(|h| h.join("Library").join("Application Support").join("Tributary"))
            .unwrap_or_else(|| PathBuf::from("."))
    }

    #[cfg(not(target_os = "macos"))]
    {
        dirs::config_dir()
            .map(|c| c.join("tributary"))
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

/// Returns the default data directory (ledgers, checkpoints, content db).
///
/// - macOS: `~/Library/Application Support/Tributary/data`
/// - Linux: `~/.local/share/tributary`
/// - Windows: `%APPDATA%\tributary\data`
pub fn default_data_dir() -> PathBuf {
    #[cfg(target_os = "macos")]
    {
        default_config_dir().join("data")
    }

    #[cfg(not(target_os = "macos"))]
    {
        dirs::data_dir()
            .map(|d| d.join("tributary"))
            .unwrap_or_else(|| PathBuf::from("./data"))
    }
}

/// Returns the default configuration file path.
pub fn default_config_path() -> PathBuf {
    default_config_dir().join("config.json")
}

// ============================================================================
// Owner-only Access
// ============================================================================

/// Mode for files holding ledgers, checkpoints and config.
#[cfg(unix)]
const FILE_MODE: u32 = 0o600;
/// Mode for directories created to hold them.
#[cfg(unix)]
const DIR_MODE: u32 = 0o700;

/// Restricts `path` to its owner.
#[cfg(unix)]
async fn restrict(path: &Path, mode: u32) -> Result<(), StoreError> {
    use std::os::unix::fs::PermissionsExt;

    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(mode)).await?;
    debug!(path = %path.display(), mode = %format!("{mode:o}"), "Restricted permissions");
    Ok(())
}

/// Creates the parent directory of a state file if missing.
async fn prepare_parent(path: &Path) -> Result<(), StoreError> {
    let Some(parent) = path.parent() else {
        return Ok(());
    };
    if parent.as_os_str().is_empty() || tokio::fs::try_exists(parent).await? {
        return Ok(());
    }

    debug!(path = %parent.display(), "Creating state directory");
    tokio::fs::create_dir_all(parent).await?;
    #[cfg(unix)]
    restrict(parent, DIR_MODE).await?;
    Ok(())
}

// ============================================================================
// JSON State Files
// ============================================================================

/// Writes `data` as pretty JSON through a temp file and a rename.
///
/// A crash mid-write leaves the previous file intact. On Unix the file is
/// readable by its owner only.
pub async fn save_json<T: Serialize>(path: &Path, data: &T) -> Result<(), StoreError> {
    debug!(path = %path.display(), "Saving JSON file");

    prepare_parent(path).await?;

    let json = serde_json::to_string_pretty(data)?;

    let temp_path = path.with_extension("json.tmp");
    tokio::fs::write(&temp_path, &json).await?;
    #[cfg(unix)]
    restrict(&temp_path, FILE_MODE).await?;
    tokio::fs::rename(&temp_path, path).await?;

    Ok(())
}

/// Loads data from a JSON file.
pub async fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T, StoreError> {
    let content = tokio::fs::read_to_string(path).await?;
    Ok(serde_json::from_str(&content)?)
}

/// Loads data from a JSON file, returning `None` when the file is absent.
///
/// A corrupt file is an error: quota and checkpoint state never start over
/// silently.
pub async fn load_json_if_exists<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, StoreError> {
    match tokio::fs::try_exists(path).await {
        Ok(true) => load_json(path).await.map(Some),
        Ok(false) => Ok(None),
        Err(e) => Err(StoreError::Io(e)),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_dirs() {
        assert!(!default_config_dir().as_os_str().is_empty());
        assert!(!default_data_dir().as_os_str().is_empty());
        assert!(default_config_path().ends_with("config.json"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_file_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = tempfile::tempdir().unwrap();
        let test_file = temp_dir.path().join("ledger").join("youtube.json");

        save_json(&test_file, &serde_json::json!({"a": 1}))
            .await
            .unwrap();

        let mode = tokio::fs::metadata(&test_file)
            .await
            .unwrap()
            .permissions()
            .mode()
            & 0o777;
        assert_eq!(mode, FILE_MODE, "File should have 0600 permissions");

        let dir_mode = tokio::fs::metadata(test_file.parent().unwrap())
            .await
            .unwrap()
            .permissions()
            .mode()
            & 0o777;
        assert_eq!(dir_mode, DIR_MODE, "Directory should have 0700 permissions");
    }
}
