//! SQLite backend configuration

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use vellum_core::{Result, VellumError};

/// Where and how to open the database
///
/// ```toml
/// path = "/var/lib/vellum/objects.db"
/// busy_timeout_ms = 5000
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SqliteConfig {
    /// Database file; an in-memory database when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    /// How long a locked database is retried before failing
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

fn default_busy_timeout_ms() -> u64 {
    5_000
}

impl Default for SqliteConfig {
    fn default() -> Self {
        SqliteConfig {
            path: None,
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

impl SqliteConfig {
    /// Database stored at `path`
    pub fn file(path: impl Into<PathBuf>) -> Self {
        SqliteConfig {
            path: Some(path.into()),
            ..Self::default()
        }
    }

    /// Set the busy timeout
    pub fn with_busy_timeout_ms(mut self, millis: u64) -> Self {
        self.busy_timeout_ms = millis;
        self
    }

    /// Reject an empty path
    pub fn validate(&self) -> Result<()> {
        if self.path.as_deref().map_or(false, |p| p.as_os_str().is_empty()) {
            return Err(VellumError::Config {
                message: "path must not be empty when set".into(),
            });
        }
        Ok(())
    }

    /// Parse from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| VellumError::Config {
            message: format!("Failed to read config file '{}': {}", path.display(), e),
        })?;
        let config: SqliteConfig = toml::from_str(&content).map_err(|e| VellumError::Config {
            message: format!("Failed to parse config file '{}': {}", path.display(), e),
        })?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config: SqliteConfig = toml::from_str("").unwrap();
        assert_eq!(config, SqliteConfig::default());
        assert!(config.path.is_none());
        assert_eq!(config.busy_timeout_ms, 5_000);
    }

    #[test]
    fn test_file_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sqlite.toml");
        std::fs::write(&path, "path = \"objects.db\"\nbusy_timeout_ms = 250\n").unwrap();
        let config = SqliteConfig::from_file(&path).unwrap();
        assert_eq!(config, SqliteConfig::file("objects.db").with_busy_timeout_ms(250));

        std::fs::write(&path, "path = \"\"\n").unwrap();
        assert!(matches!(
            SqliteConfig::from_file(&path).unwrap_err(),
            VellumError::Config { .. }
        ));
    }
}
