//! Tool settings (`config.toml` in the config directory)

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::paths;

/// replan settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Schema definition used when `--schema` is not given
    #[serde(default)]
    pub schema: Option<String>,

    /// Default number of parallel jobs for `batch`
    #[serde(default = "default_jobs")]
    pub jobs: usize,

    /// Print a warning for every collection that fell back to the proposal
    #[serde(default = "default_true")]
    pub warn_on_fallback: bool,
}

fn default_jobs() -> usize {
    4
}

fn default_true() -> bool {
    true
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            schema: None,
            jobs: default_jobs(),
            warn_on_fallback: true,
        }
    }
}

impl Settings {
    /// Load settings from the config directory, falling back to defaults
    pub fn load() -> Result<Self> {
        Self::load_from(&paths::settings_file()?)
    }

    /// Load settings from a specific file; a missing file yields defaults
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("No settings file at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Could not read settings file: {}", path.display()))?;
        let settings: Self = toml::from_str(&content)
            .with_context(|| format!("Invalid TOML format in {}", path.display()))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Validate the settings
    pub fn validate(&self) -> Result<()> {
        if self.jobs == 0 {
            bail!("jobs must be at least 1");
        }
        if let Some(schema) = &self.schema
            && schema.trim().is_empty()
        {
            bail!("schema path cannot be empty");
        }
        Ok(())
    }

    /// Schema path to use: the flag, then `REPLAN_SCHEMA`, then the settings file
    pub fn schema_path(&self, flag: Option<&Path>) -> Result<PathBuf> {
        if let Some(path) = flag {
            return Ok(paths::expand(&path.to_string_lossy()));
        }
        if let Ok(path) = std::env::var(paths::ENV_SCHEMA) {
            return Ok(paths::expand(&path));
        }
        match &self.schema {
            Some(path) => Ok(paths::expand(path)),
            None => bail!(
                "No schema definition given. Pass --schema, set {}, or add `schema = \"...\"` to {}",
                paths::ENV_SCHEMA,
                paths::SETTINGS_FILE
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paths::tests::{env_lock, with_env_var, without_env_var};
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let settings = Settings::load_from(&dir.path().join("config.toml")).unwrap();
        assert_eq!(settings.jobs, 4);
        assert!(settings.warn_on_fallback);
        assert!(settings.schema.is_none());
    }

    #[test]
    fn test_load_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "schema = \"/etc/replan/monitor.toml\"\njobs = 8\nwarn_on_fallback = false\n")
            .unwrap();

        let settings = Settings::load_from(&path).unwrap();
        assert_eq!(settings.jobs, 8);
        assert!(!settings.warn_on_fallback);
        assert_eq!(settings.schema.as_deref(), Some("/etc/replan/monitor.toml"));
    }

    #[test]
    fn test_zero_jobs_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "jobs = 0\n").unwrap();
        assert!(Settings::load_from(&path).is_err());
    }

    #[test]
    fn test_invalid_toml_names_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "jobs = [").unwrap();
        let err = Settings::load_from(&path).unwrap_err();
        assert!(format!("{err}").contains("config.toml"));
    }

    #[test]
    fn test_schema_path_priority() {
        let _env = env_lock();
        let settings = Settings {
            schema: Some("/from/settings.toml".to_string()),
            ..Settings::default()
        };

        without_env_var(paths::ENV_SCHEMA, || {
            assert_eq!(
                settings.schema_path(Some(Path::new("/from/flag.toml"))).unwrap(),
                PathBuf::from("/from/flag.toml")
            );
            assert_eq!(
                settings.schema_path(None).unwrap(),
                PathBuf::from("/from/settings.toml")
            );
            assert!(Settings::default().schema_path(None).is_err());
        });

        with_env_var(paths::ENV_SCHEMA, "/from/env.toml", || {
            assert_eq!(settings.schema_path(None).unwrap(), PathBuf::from("/from/env.toml"));
        });
    }
}
