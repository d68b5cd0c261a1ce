//! bz - command line client for Backblaze B2
//!
//! Remote paths are written `account/bucket/name`, where `account` is a
//! profile created with `bz account set`.

mod commands;
mod exit_code;
mod output;

use clap::{CommandFactory, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use bz_core::ConfigManager;

use commands::account::AccountCommands;
use commands::bucket::BucketCommands;
use commands::completions::CompletionsArgs;
use commands::get::GetArgs;
use commands::ls::LsArgs;
use commands::put::PutArgs;
use commands::rm::RmArgs;
use exit_code::ExitCode;
use output::OutputConfig;

#[derive(Parser, Debug)]
#[command(name = "bz", version, about = "Command line client for Backblaze B2")]
struct Cli {
    /// Print JSON instead of human-readable output
    #[arg(long, global = true)]
    json: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    no_color: bool,

    /// Print only errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Log requests and retries to stderr
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Manage account profiles
    #[command(subcommand)]
    Account(AccountCommands),

    /// Manage buckets
    #[command(subcommand)]
    Bucket(BucketCommands),

    /// List files
    Ls(LsArgs),

    /// Upload a file
    Put(PutArgs),

    /// Download a file
    Get(GetArgs),

    /// Delete file versions
    Rm(RmArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    let output_config = OutputConfig {
        json: cli.json || default_output_is_json(),
        no_color: cli.no_color,
        quiet: cli.quiet,
    };

    let code = match cli.command {
        Commands::Account(cmd) => commands::account::execute(cmd, output_config).await,
        Commands::Bucket(cmd) => commands::bucket::execute(cmd, output_config).await,
        Commands::Ls(args) => commands::ls::execute(args, output_config).await,
        Commands::Put(args) => commands::put::execute(args, output_config).await,
        Commands::Get(args) => commands::get::execute(args, output_config).await,
        Commands::Rm(args) => commands::rm::execute(args, output_config).await,
        Commands::Completions(args) => commands::completions::execute(args, Cli::command()),
    };

    std::process::exit(code.as_i32());
}

/// `RUST_LOG` wins over `--debug`; logs never go to stdout
fn init_tracing(debug: bool) {
    let default = if debug { "bz=debug,bz_b2=debug,bz_core=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(debug)
        .init();
}

/// `[defaults] output = "json"` in the config file
fn default_output_is_json() -> bool {
    ConfigManager::new()
        .and_then(|m| m.load())
        .map(|c| c.defaults.output == "json")
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["bz", "ls", "main/photos", "--json", "-r"]).unwrap();
        assert!(cli.json);
        match cli.command {
            Commands::Ls(args) => {
                assert_eq!(args.path, "main/photos");
                assert!(args.recursive);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_get_range_and_metadata_parsing() {
        let cli = Cli::try_parse_from(["bz", "get", "main/b/a.txt", "-", "--range", "2..4"]).unwrap();
        match cli.command {
            Commands::Get(args) => {
                assert_eq!(args.range, Some(2..4));
                assert_eq!(args.target.as_deref(), Some("-"));
            }
            other => panic!("unexpected command: {other:?}"),
        }

        let cli = Cli::try_parse_from([
            "bz", "put", "a.txt", "main/b/", "--meta", "k=v", "--meta", "x=y",
        ])
        .unwrap();
        match cli.command {
            Commands::Put(args) => assert_eq!(args.metadata.len(), 2),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_rm_rejects_id_with_all_versions() {
        let result = Cli::try_parse_from([
            "bz",
            "rm",
            "main/b/a.txt",
            "--id",
            "v1",
            "--all-versions",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_ls_page_size_bounds() {
        assert!(Cli::try_parse_from(["bz", "ls", "main/b", "--page-size", "0"]).is_err());
        assert!(Cli::try_parse_from(["bz", "ls", "main/b", "--page-size", "1001"]).is_err());
        assert!(Cli::try_parse_from(["bz", "ls", "main/b", "--page-size", "1000"]).is_ok());
    }
}
