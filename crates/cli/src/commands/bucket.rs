//! Bucket commands

use clap::Subcommand;
use serde::Serialize;

use bz_core::{BucketInfo, parse_path};

use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};

#[derive(Subcommand, Debug)]
pub enum BucketCommands {
    /// List the buckets an account can see
    List(ListArgs),

    /// Create a bucket
    Create(CreateArgs),

    /// Delete an empty bucket
    Rm(RmArgs),
}

#[derive(clap::Args, Debug)]
pub struct ListArgs {
    /// Account name
    pub account: String,
}

#[derive(clap::Args, Debug)]
pub struct CreateArgs {
    /// Bucket path (account/bucket)
    pub path: String,

    /// Make the bucket's files readable without authorization
    #[arg(long)]
    pub public: bool,
}

#[derive(clap::Args, Debug)]
pub struct RmArgs {
    /// Bucket path (account/bucket)
    pub path: String,
}

#[derive(Serialize)]
struct BucketListOutput {
    buckets: Vec<BucketInfo>,
}

#[derive(Serialize)]
struct BucketOperationOutput {
    success: bool,
    bucket: BucketInfo,
}

/// Execute a bucket subcommand
pub async fn execute(cmd: BucketCommands, output_config: OutputConfig) -> ExitCode {
    let formatter = Formatter::new(output_config);
    match cmd {
        BucketCommands::List(args) => execute_list(args, &formatter).await,
        BucketCommands::Create(args) => execute_create(args, &formatter).await,
        BucketCommands::Rm(args) => execute_rm(args, &formatter).await,
    }
}

async fn execute_list(args: ListArgs, formatter: &Formatter) -> ExitCode {
    let client = match super::connect(&args.account, formatter).await {
        Ok(c) => c,
        Err(code) => return code,
    };

    let buckets = match client.buckets(None).await {
        Ok(b) => b,
        Err(e) => return super::report(formatter, &e),
    };

    if formatter.is_json() {
        formatter.json(&BucketListOutput {
            buckets: buckets.iter().map(|b| b.info().clone()).collect(),
        });
    } else if buckets.is_empty() {
        formatter.println("No buckets.");
    } else {
        let mut table = formatter.table(&["NAME", "TYPE", "ID"]);
        for bucket in &buckets {
            table.add_row(vec![
                formatter.style_name(bucket.name()),
                bucket.bucket_type().to_string(),
                formatter.style_muted(bucket.id()),
            ]);
        }
        formatter.print_table(&table);
    }
    ExitCode::Success
}

async fn execute_create(args: CreateArgs, formatter: &Formatter) -> ExitCode {
    let path = match parse_path(&args.path) {
        Ok(p) => p,
        Err(e) => {
            formatter.error(&e.to_string());
            return ExitCode::UsageError;
        }
    };
    let name = match path.require_bucket() {
        Ok(n) => n,
        Err(e) => {
            formatter.error(&e.to_string());
            return ExitCode::UsageError;
        }
    };

    let client = match super::connect(&path.account, formatter).await {
        Ok(c) => c,
        Err(code) => return code,
    };

    match client.create_bucket(name, args.public).await {
        Ok(bucket) => {
            if formatter.is_json() {
                formatter.json(&BucketOperationOutput {
                    success: true,
                    bucket: bucket.info().clone(),
                });
            } else {
                let styled = formatter.style_name(bucket.name());
                formatter.success(&format!(
                    "Bucket '{styled}' created ({}).",
                    bucket.bucket_type()
                ));
            }
            ExitCode::Success
        }
        Err(e) => super::report(formatter, &e),
    }
}

async fn execute_rm(args: RmArgs, formatter: &Formatter) -> ExitCode {
    let path = match parse_path(&args.path) {
        Ok(p) => p,
        Err(e) => {
            formatter.error(&e.to_string());
            return ExitCode::UsageError;
        }
    };
    if !path.key.is_empty() {
        formatter.error(&format!("'{path}' names a file, not a bucket"));
        return ExitCode::UsageError;
    }

    let bucket = match super::open_bucket(&path, formatter).await {
        Ok(b) => b,
        Err(code) => return code,
    };
    let info = bucket.info().clone();

    match bucket.delete().await {
        Ok(()) => {
            if formatter.is_json() {
                formatter.json(&BucketOperationOutput {
                    success: true,
                    bucket: info,
                });
            } else {
                let styled = formatter.style_name(&info.name);
                formatter.success(&format!("Bucket '{styled}' deleted."));
            }
            ExitCode::Success
        }
        Err(e) => super::report(formatter, &e),
    }
}
