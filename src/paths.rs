//! Centralized path resolution for replan
//!
//! # Environment Variables
//!
//! - `REPLAN_CONFIG_DIR` - Override config directory (e.g., `~/dotfiles/replan`)
//! - `REPLAN_SCHEMA` - Schema definition used when `--schema` is not given
//!
//! # Path Resolution Priority
//!
//! For config_dir():
//! 1. `REPLAN_CONFIG_DIR` environment variable
//! 2. `XDG_CONFIG_HOME/replan` (if set)
//! 3. Platform default:
//!    - Windows: `%APPDATA%\replan`
//!    - macOS/Linux: `~/.config/replan`

use anyhow::{Context, Result};
use std::path::PathBuf;

/// Environment variable for config directory override
pub const ENV_CONFIG_DIR: &str = "REPLAN_CONFIG_DIR";

/// Environment variable for the default schema definition
pub const ENV_SCHEMA: &str = "REPLAN_SCHEMA";

/// Name of the settings file inside the config directory
pub const SETTINGS_FILE: &str = "config.toml";

/// Get the replan config directory path
pub fn config_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(ENV_CONFIG_DIR) {
        let path = expand(&dir);
        log::debug!("Using config dir from {}: {}", ENV_CONFIG_DIR, path.display());
        return Ok(path);
    }

    if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
        let path = PathBuf::from(xdg_config).join("replan");
        log::debug!("Using XDG_CONFIG_HOME: {}", path.display());
        return Ok(path);
    }

    #[cfg(windows)]
    {
        if let Some(app_data) = dirs::config_dir() {
            let path = app_data.join("replan");
            log::debug!("Using Windows config dir: {}", path.display());
            return Ok(path);
        }
    }

    let home = dirs::home_dir().context("Could not determine home directory")?;
    let path = home.join(".config").join("replan");
    log::debug!("Using default config dir: {}", path.display());
    Ok(path)
}

/// Path of the settings file
pub fn settings_file() -> Result<PathBuf> {
    Ok(config_dir()?.join(SETTINGS_FILE))
}

/// Expand ~ and environment variables in a path string.
///
/// All path options (CLI flags and settings) go through here.
pub fn expand(path: &str) -> PathBuf {
    let expanded = shellexpand::full(path).unwrap_or(std::borrow::Cow::Borrowed(path));
    PathBuf::from(expanded.as_ref())
}

// ============================================================================
// Tests
// ============================================================================
