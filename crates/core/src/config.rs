//! Configuration management
//!
//! The configuration lives in a single TOML file. Its location is
//! `$BZ_CONFIG_DIR/config.toml` when the variable is set, otherwise
//! `<platform config dir>/bz/config.toml`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::account::Account;
use crate::error::{Error, Result};
use crate::retry::DEFAULT_UPLOAD_ATTEMPTS;

/// Current schema version of the config file
pub const SCHEMA_VERSION: u32 = 1;

/// Environment variable overriding the config directory
pub const CONFIG_DIR_ENV: &str = "BZ_CONFIG_DIR";

/// Largest page the listing endpoints accept
pub const MAX_PAGE_SIZE: u32 = 1000;

/// Defaults applied to every command unless overridden
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Defaults {
    /// Files requested per listing round trip
    pub page_size: u32,
    /// Attempts an upload makes when authorization keeps expiring
    pub upload_attempts: u32,
    /// Per-request timeout in seconds, 0 disables it
    pub timeout_secs: u64,
    /// Output format: "human" or "json"
    pub output: String,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            page_size: MAX_PAGE_SIZE,
            upload_attempts: DEFAULT_UPLOAD_ATTEMPTS,
            timeout_secs: 0,
            output: "human".to_string(),
        }
    }
}

/// Root configuration document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,

    #[serde(default)]
    pub defaults: Defaults,

    #[serde(default)]
    pub accounts: Vec<Account>,
}

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

impl Default for Config {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            defaults: Defaults::default(),
            accounts: Vec::new(),
        }
    }
}

impl Config {
    /// Check values that serde cannot
    pub fn validate(&self) -> Result<()> {
        if self.schema_version > SCHEMA_VERSION {
            return Err(Error::Config(format!(
                "config schema version {} is newer than supported version {SCHEMA_VERSION}",
                self.schema_version
            )));
        }
        if self.defaults.page_size == 0 {
            return Err(Error::Config("defaults.page_size must be at least 1".into()));
        }
        if self.defaults.upload_attempts == 0 {
            return Err(Error::Config(
                "defaults.upload_attempts must be at least 1".into(),
            ));
        }
        if self.defaults.output != "human" && self.defaults.output != "json" {
            return Err(Error::Config(format!(
                "defaults.output must be 'human' or 'json', got '{}'",
                self.defaults.output
            )));
        }
        for account in &self.accounts {
            account.validate()?;
        }
        Ok(())
    }
}

/// Loads and saves the configuration file
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Create a manager for the default config location
    pub fn new() -> Result<Self> {
        Ok(Self {
            config_path: default_config_dir()?.join("config.toml"),
        })
    }

    /// Create a manager for an explicit config file
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: path.into(),
        }
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Load the configuration, returning defaults when the file is missing
    pub fn load(&self) -> Result<Config> {
        if !self.config_path.exists() {
            tracing::debug!(path = %self.config_path.display(), "No config file, using defaults");
            return Ok(Config::default());
        }

        let content = std::fs::read_to_string(&self.config_path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Write the configuration, creating parent directories as needed
    pub fn save(&self, config: &Config) -> Result<()> {
        config.validate()?;

        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(config)?;
        std::fs::write(&self.config_path, content)?;

        // Application keys are stored in plain text
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&self.config_path, std::fs::Permissions::from_mode(0o600))?;
        }

        Ok(())
    }
}

fn default_config_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(CONFIG_DIR_ENV)
        && !dir.is_empty()
    {
        return Ok(PathBuf::from(dir));
    }

    dirs::config_dir()
        .map(|d| d.join("bz"))
        .ok_or_else(|| Error::Config("could not determine config directory".into()))
}
