//! Account management
//!
//! An account is a named set of B2 application key credentials, referenced
//! as the first segment of remote paths (`account/bucket/name`).

use serde::{Deserialize, Serialize};

use crate::config::ConfigManager;
use crate::error::{Error, Result};

/// Endpoint used for `b2_authorize_account` unless an account overrides it
pub const DEFAULT_AUTH_URL: &str = "https://api.backblazeb2.com";

/// Credentials and endpoint for one B2 account
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Profile name (e.g., "main", "backup")
    pub name: String,

    /// Application key ID (or the master account ID)
    pub key_id: String,

    /// Application key secret
    pub application_key: String,

    /// Authorization endpoint
    #[serde(default = "default_auth_url")]
    pub auth_url: String,

    /// Skip TLS certificate verification
    #[serde(default)]
    pub insecure: bool,
}

fn default_auth_url() -> String {
    DEFAULT_AUTH_URL.to_string()
}

impl Account {
    pub fn new(
        name: impl Into<String>,
        key_id: impl Into<String>,
        application_key: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            key_id: key_id.into(),
            application_key: application_key.into(),
            auth_url: default_auth_url(),
            insecure: false,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() || self.name.contains('/') {
            return Err(Error::Config(format!(
                "invalid account name '{}': must be non-empty and contain no '/'",
                self.name
            )));
        }
        if self.key_id.is_empty() || self.application_key.is_empty() {
            return Err(Error::Config(format!(
                "account '{}' is missing its key ID or application key",
                self.name
            )));
        }
        url::Url::parse(&self.auth_url).map_err(|e| {
            Error::Config(format!(
                "account '{}' has an invalid auth_url '{}': {e}",
                self.name, self.auth_url
            ))
        })?;
        Ok(())
    }
}

impl std::fmt::Debug for Account {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Account")
            .field("name", &self.name)
            .field("key_id", &self.key_id)
            .field("application_key", &"<redacted>")
            .field("auth_url", &self.auth_url)
            .field("insecure", &self.insecure)
            .finish()
    }
}

/// CRUD over the accounts stored in the config file
#[derive(Debug, Clone)]
pub struct AccountManager {
    config_manager: ConfigManager,
}

impl AccountManager {
    /// Create a manager for the default config location
    pub fn new() -> Result<Self> {
        Ok(Self {
            config_manager: ConfigManager::new()?,
        })
    }

    pub fn with_config_manager(config_manager: ConfigManager) -> Self {
        Self { config_manager }
    }

    /// Add an account or replace the one with the same name
    pub fn set(&self, account: Account) -> Result<()> {
        account.validate()?;
        let mut config = self.config_manager.load()?;
        match config.accounts.iter_mut().find(|a| a.name == account.name) {
            Some(existing) => *existing = account,
            None => config.accounts.push(account),
        }
        self.config_manager.save(&config)
    }

    pub fn get(&self, name: &str) -> Result<Account> {
        let config = self.config_manager.load()?;
        config
            .accounts
            .into_iter()
            .find(|a| a.name == name)
            .ok_or_else(|| Error::AccountNotFound(name.to_string()))
    }

    pub fn list(&self) -> Result<Vec<Account>> {
        Ok(self.config_manager.load()?.accounts)
    }

    pub fn remove(&self, name: &str) -> Result<()> {
        let mut config = self.config_manager.load()?;
        let before = config.accounts.len();
        config.accounts.retain(|a| a.name != name);
        if config.accounts.len() == before {
            return Err(Error::AccountNotFound(name.to_string()));
        }
        self.config_manager.save(&config)
    }

    pub fn exists(&self, name: &str) -> Result<bool> {
        Ok(self.list()?.iter().any(|a| a.name == name))
    }
}
