//! Store configuration via `vellum.toml`
//!
//! Every field is optional; an empty file yields the defaults. Audit
//! identity overrides take precedence over the environment.

use serde::{Deserialize, Serialize};
use std::path::Path;
use vellum_core::{Result, VellumError};

/// Config file name looked up by deployments
pub const CONFIG_FILE_NAME: &str = "vellum.toml";

/// Store configuration loaded from `vellum.toml`.
///
/// # Example
///
/// ```toml
/// allow_temporary_types = true
/// default_comment = ""
/// # username = "svc-batch"
/// # hostname = "batch-01"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Accept writes of types registered as temporary
    #[serde(default = "default_allow_temporary_types")]
    pub allow_temporary_types: bool,
    /// Username recorded on every transaction (default: from the environment)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Hostname recorded on every transaction (default: from the environment)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    /// Comment recorded on implicit transactions
    #[serde(default)]
    pub default_comment: String,
}

fn default_allow_temporary_types() -> bool {
    true
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            allow_temporary_types: default_allow_temporary_types(),
            username: None,
            hostname: None,
            default_comment: String::new(),
        }
    }
}

impl StoreConfig {
    /// Refuse or accept temporary types
    pub fn with_temporary_types(mut self, allow: bool) -> Self {
        self.allow_temporary_types = allow;
        self
    }

    /// Override the recorded username
    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    /// Override the recorded hostname
    pub fn with_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = Some(hostname.into());
        self
    }

    /// Comment for implicit transactions
    pub fn with_default_comment(mut self, comment: impl Into<String>) -> Self {
        self.default_comment = comment.into();
        self
    }

    /// Reject empty audit overrides
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [("username", &self.username), ("hostname", &self.hostname)] {
            if value.as_deref().map_or(false, |v| v.trim().is_empty()) {
                return Err(VellumError::Config {
                    message: format!("{} must not be empty when set", name),
                });
            }
        }
        Ok(())
    }

    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# Vellum store configuration
#
# Accept writes of types registered as temporary (default: true).
# Stores that talk to a shared remote server should set this to false.
allow_temporary_types = true

# Comment recorded on implicit (single-operation) transactions.
default_comment = ""

# Audit identity overrides. When absent, USER/USERNAME and
# HOSTNAME/COMPUTERNAME are read from the environment.
# username = "svc-batch"
# hostname = "batch-01"
"#
    }

    /// Read and parse config from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| VellumError::Config {
            message: format!("Failed to read config file '{}': {}", path.display(), e),
        })?;
        let config: StoreConfig = toml::from_str(&content).map_err(|e| VellumError::Config {
            message: format!("Failed to parse config file '{}': {}", path.display(), e),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Write the default config file if it does not already exist.
    pub fn write_default_if_missing(path: &Path) -> Result<()> {
        if !path.exists() {
            std::fs::write(path, Self::default_toml()).map_err(|e| VellumError::Config {
                message: format!("Failed to write default config file '{}': {}", path.display(), e),
            })?;
        }
        Ok(())
    }
}
