//! Account management commands
//!
//! Accounts are named B2 application keys stored in the config file. The
//! name is the first segment of every remote path.

use clap::Subcommand;
use serde::Serialize;

use bz_core::{Account, AccountManager, DEFAULT_AUTH_URL, Error};

use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};

/// Account subcommands
#[derive(Subcommand, Debug)]
pub enum AccountCommands {
    /// Add or update an account
    Set(SetArgs),

    /// List configured accounts
    List(ListArgs),

    /// Remove an account
    Remove(RemoveArgs),

    /// Authorize an account and show what its key may access
    Info(InfoArgs),
}

#[derive(clap::Args, Debug)]
pub struct SetArgs {
    /// Account name (e.g., "main", "backup")
    pub name: String,

    /// Application key ID
    pub key_id: String,

    /// Application key
    pub application_key: String,

    /// Authorization endpoint
    #[arg(long, default_value = DEFAULT_AUTH_URL)]
    pub auth_url: String,

    /// Accept invalid TLS certificates
    #[arg(long, default_value = "false")]
    pub insecure: bool,
}

#[derive(clap::Args, Debug)]
pub struct ListArgs {
    /// Show the key ID and endpoint too
    #[arg(short, long)]
    pub long: bool,
}

#[derive(clap::Args, Debug)]
pub struct RemoveArgs {
    /// Name of the account to remove
    pub name: String,
}

#[derive(clap::Args, Debug)]
pub struct InfoArgs {
    /// Name of the account to authorize
    pub name: String,
}

#[derive(Serialize)]
struct AccountListOutput {
    accounts: Vec<AccountSummary>,
}

/// Account fields safe to print; the application key never is
#[derive(Serialize)]
struct AccountSummary {
    name: String,
    key_id: String,
    auth_url: String,
    insecure: bool,
}

impl From<&Account> for AccountSummary {
    fn from(account: &Account) -> Self {
        Self {
            name: account.name.clone(),
            key_id: account.key_id.clone(),
            auth_url: account.auth_url.clone(),
            insecure: account.insecure,
        }
    }
}

#[derive(Serialize)]
struct AccountOperationOutput {
    success: bool,
    account: String,
    message: String,
}

#[derive(Serialize)]
struct AccountInfoOutput {
    account: String,
    account_id: String,
    api_url: String,
    download_url: String,
    recommended_part_size: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    bucket_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    name_prefix: Option<String>,
    capabilities: Vec<String>,
}

/// Execute an account subcommand
pub async fn execute(cmd: AccountCommands, output_config: OutputConfig) -> ExitCode {
    let formatter = Formatter::new(output_config);

    if let AccountCommands::Info(args) = cmd {
        return execute_info(args, &formatter).await;
    }

    let manager = match AccountManager::new() {
        Ok(m) => m,
        Err(e) => {
            formatter.error(&format!("Failed to load accounts: {e}"));
            return ExitCode::GeneralError;
        }
    };

    match cmd {
        AccountCommands::Set(args) => execute_set(args, &manager, &formatter),
        AccountCommands::List(args) => execute_list(args, &manager, &formatter),
        AccountCommands::Remove(args) => execute_remove(args, &manager, &formatter),
        // Handled above without touching the config file
        AccountCommands::Info(_) => ExitCode::Success,
    }
}

fn execute_set(args: SetArgs, manager: &AccountManager, formatter: &Formatter) -> ExitCode {
    let mut account = Account::new(&args.name, &args.key_id, &args.application_key);
    account.auth_url = args.auth_url;
    account.insecure = args.insecure;

    if let Err(e) = account.validate() {
        formatter.error(&e.to_string());
        return ExitCode::UsageError;
    }

    match manager.set(account) {
        Ok(()) => {
            if formatter.is_json() {
                formatter.json(&AccountOperationOutput {
                    success: true,
                    account: args.name.clone(),
                    message: format!("Account '{}' configured successfully", args.name),
                });
            } else {
                let styled_name = formatter.style_name(&args.name);
                formatter.success(&format!("Account '{styled_name}' configured successfully."));
            }
            ExitCode::Success
        }
        Err(e) => {
            formatter.error(&e.to_string());
            ExitCode::GeneralError
        }
    }
}

fn execute_list(args: ListArgs, manager: &AccountManager, formatter: &Formatter) -> ExitCode {
    let accounts = match manager.list() {
        Ok(a) => a,
        Err(e) => {
            formatter.error(&e.to_string());
            return ExitCode::GeneralError;
        }
    };

    if formatter.is_json() {
        formatter.json(&AccountListOutput {
            accounts: accounts.iter().map(AccountSummary::from).collect(),
        });
    } else if accounts.is_empty() {
        formatter.println("No accounts configured.");
    } else {
        for account in &accounts {
            let styled_name = formatter.style_name(&format!("{:<12}", account.name));
            if args.long {
                let styled_key = formatter.style_key(&account.key_id);
                let styled_url = formatter.style_url(&account.auth_url);
                let insecure = if account.insecure { " (insecure)" } else { "" };
                formatter.println(&format!("{styled_name} {styled_key} {styled_url}{insecure}"));
            } else {
                formatter.println(&format!("{styled_name} {}", account.key_id));
            }
        }
    }
    ExitCode::Success
}

fn execute_remove(args: RemoveArgs, manager: &AccountManager, formatter: &Formatter) -> ExitCode {
    match manager.remove(&args.name) {
        Ok(()) => {
            if formatter.is_json() {
                formatter.json(&AccountOperationOutput {
                    success: true,
                    account: args.name.clone(),
                    message: format!("Account '{}' removed successfully", args.name),
                });
            } else {
                let styled_name = formatter.style_name(&args.name);
                formatter.success(&format!("Account '{styled_name}' removed successfully."));
            }
            ExitCode::Success
        }
        Err(Error::AccountNotFound(_)) => {
            formatter.error(&format!("Account '{}' not found", args.name));
            ExitCode::NotFound
        }
        Err(e) => {
            formatter.error(&e.to_string());
            ExitCode::GeneralError
        }
    }
}

async fn execute_info(args: InfoArgs, formatter: &Formatter) -> ExitCode {
    let client = match super::connect(&args.name, formatter).await {
        Ok(c) => c,
        Err(code) => return code,
    };

    let info = client.login_info();
    let allowed = info.allowed.clone().unwrap_or_default();
    let output = AccountInfoOutput {
        account: args.name,
        account_id: info.account_id.clone(),
        api_url: info.api_url.clone(),
        download_url: info.download_url.clone(),
        recommended_part_size: info.recommended_part_size,
        bucket_name: allowed.bucket_name,
        name_prefix: allowed.name_prefix,
        capabilities: allowed.capabilities,
    };

    if formatter.is_json() {
        formatter.json(&output);
        return ExitCode::Success;
    }

    formatter.println(&format!(
        "Account:      {}",
        formatter.style_name(&output.account)
    ));
    formatter.println(&format!("Account ID:   {}", output.account_id));
    formatter.println(&format!(
        "API URL:      {}",
        formatter.style_url(&output.api_url)
    ));
    formatter.println(&format!(
        "Download URL: {}",
        formatter.style_url(&output.download_url)
    ));
    if let Some(bucket) = &output.bucket_name {
        formatter.println(&format!("Bucket:       {bucket}"));
    }
    if let Some(prefix) = &output.name_prefix {
        formatter.println(&format!("Name prefix:  {prefix}"));
    }
    if !output.capabilities.is_empty() {
        formatter.println(&format!("Capabilities: {}", output.capabilities.join(", ")));
    }
    ExitCode::Success
}
