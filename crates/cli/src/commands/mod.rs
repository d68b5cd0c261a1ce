//! Subcommand implementations
//!
//! Each command takes its parsed arguments plus the global output switches
//! and returns the process exit code. Errors are printed by the command.

pub mod account;
pub mod bucket;
pub mod completions;
pub mod get;
pub mod ls;
pub mod put;
pub mod rm;

use bz_b2::{Bucket, Client, ClientOptions};
use bz_core::{AccountManager, ConfigManager, Error, RemotePath};

use crate::exit_code::ExitCode;
use crate::output::Formatter;

/// Authorize the named account using the configured defaults
pub(crate) async fn connect(account_name: &str, formatter: &Formatter) -> Result<Client, ExitCode> {
    let config_manager = match ConfigManager::new() {
        Ok(cm) => cm,
        Err(e) => {
            formatter.error(&format!("Failed to locate configuration: {e}"));
            return Err(ExitCode::GeneralError);
        }
    };
    let config = match config_manager.load() {
        Ok(c) => c,
        Err(e) => {
            formatter.error(&format!("Failed to load configuration: {e}"));
            return Err(ExitCode::GeneralError);
        }
    };

    let manager = AccountManager::with_config_manager(config_manager);
    let account = match manager.get(account_name) {
        Ok(a) => a,
        Err(Error::AccountNotFound(_)) => {
            formatter.error(&format!("Account '{account_name}' not found"));
            return Err(ExitCode::NotFound);
        }
        Err(e) => {
            formatter.error(&e.to_string());
            return Err(ExitCode::GeneralError);
        }
    };

    let options = ClientOptions::from_defaults(&config.defaults);
    tracing::debug!(account = %account.name, auth_url = %account.auth_url, "Authorizing");
    Client::connect(&account, options).await.map_err(|e| {
        formatter.error(&format!("Failed to authorize account '{account_name}': {e}"));
        ExitCode::from_error(&e)
    })
}

/// Authorize the path's account and resolve its bucket
pub(crate) async fn open_bucket(
    path: &RemotePath,
    formatter: &Formatter,
) -> Result<Bucket, ExitCode> {
    let bucket_name = match path.require_bucket() {
        Ok(name) => name,
        Err(e) => {
            formatter.error(&e.to_string());
            return Err(ExitCode::UsageError);
        }
    };

    let client = connect(&path.account, formatter).await?;
    client
        .bucket_by_name(bucket_name, false)
        .await
        .map_err(|e| report(formatter, &e))
}

/// Print a library error and classify it
pub(crate) fn report(formatter: &Formatter, error: &Error) -> ExitCode {
    formatter.error(&error.to_string());
    ExitCode::from_error(error)
}
