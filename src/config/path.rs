//! Settings file location.

use std::path::{Path, PathBuf};

use tracing::{debug, trace};

use crate::error::{LinkError, Result};

/// Environment variable that overrides the settings file path.
pub const ENV_CONFIG: &str = "LEDLINK_CONFIG";

const APP_DIR: &str = "ledlink";
const SETTINGS_FILE: &str = "settings.toml";

/// `<config dir>/ledlink/settings.toml` for the current platform.
pub fn default_settings_path() -> Result<PathBuf> {
    let dir = dirs::config_dir().ok_or_else(|| {
        LinkError::ConfigInvalid("Could not determine configuration directory".to_string())
    })?;
    Ok(dir.join(APP_DIR).join(SETTINGS_FILE))
}

/// Expand a leading `~` to the home directory.
pub fn resolve_path(path: &Path) -> Result<PathBuf> {
    let path_str = path.to_string_lossy();
    trace!(path = %path_str, "Resolving path");

    if path_str == "~" || path_str.starts_with("~/") {
        let home = home_dir()?;
        let rest = path_str.strip_prefix("~/").unwrap_or("");
        let resolved = if rest.is_empty() {
            home
        } else {
            home.join(rest)
        };
        debug!(
            original = %path.display(),
            resolved = %resolved.display(),
            "Expanded home directory path"
        );
        return Ok(resolved);
    }

    Ok(path.to_path_buf())
}

/// Resolve the user's home directory (cross-platform).
pub fn home_dir() -> Result<PathBuf> {
    dirs::home_dir()
        .ok_or_else(|| LinkError::ConfigInvalid("Could not determine home directory".to_string()))
}
