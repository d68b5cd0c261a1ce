//! ls command - List files in a bucket
//!
//! Without `--recursive` the listing is split at `/`, so each level shows
//! its files plus one folder record per sub-prefix.

use clap::Args;
use serde::Serialize;

use bz_b2::ListOptions;
use bz_core::{Action, FileInfo, parse_path};

use crate::exit_code::ExitCode;
use crate::output::formatter::{format_size, format_timestamp};
use crate::output::{Formatter, OutputConfig};

/// List files in a bucket
#[derive(Args, Debug)]
pub struct LsArgs {
    /// Path to list (account/bucket[/prefix])
    pub path: String,

    /// List every stored version, hide markers included
    #[arg(long)]
    pub versions: bool,

    /// Descend into sub-prefixes instead of showing folders
    #[arg(short, long)]
    pub recursive: bool,

    /// Records fetched per request (1-1000)
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..=1000))]
    pub page_size: Option<u32>,

    /// Stop after this many records
    #[arg(long)]
    pub max: Option<usize>,
}

#[derive(Debug, Serialize)]
struct LsOutput {
    bucket: String,
    prefix: String,
    files: Vec<FileInfo>,
    /// True when `--max` cut the listing short
    truncated: bool,
}

/// Execute the ls command
pub async fn execute(args: LsArgs, output_config: OutputConfig) -> ExitCode {
    let formatter = Formatter::new(output_config);

    let path = match parse_path(&args.path) {
        Ok(p) => p,
        Err(e) => {
            formatter.error(&e.to_string());
            return ExitCode::UsageError;
        }
    };

    let bucket = match super::open_bucket(&path, &formatter).await {
        Ok(b) => b,
        Err(code) => return code,
    };

    let options = list_options(&args, &path.key);
    let mut listing = bucket.list(options);

    let mut files = Vec::new();
    let mut truncated = false;
    while listing.advance().await {
        if args.max.is_some_and(|max| files.len() >= max) {
            truncated = true;
            break;
        }
        if let Some(info) = listing.file_info() {
            if !formatter.is_json() {
                print_entry(&formatter, info, &path.key);
            }
            files.push(info.clone());
        }
    }

    if let Some(e) = listing.err() {
        return super::report(&formatter, e);
    }

    if formatter.is_json() {
        formatter.json(&LsOutput {
            bucket: bucket.name().to_string(),
            prefix: path.key,
            files,
            truncated,
        });
    } else if files.is_empty() && !formatter.is_quiet() {
        formatter.println("No files.");
    }

    ExitCode::Success
}

fn list_options(args: &LsArgs, prefix: &str) -> ListOptions {
    let mut options = ListOptions::new();
    if args.versions {
        options = options.versions();
    }
    if !prefix.is_empty() {
        options = options.prefix(prefix);
    }
    if !args.recursive {
        options = options.delimiter("/");
    }
    if let Some(page_size) = args.page_size {
        options = options.page_size(page_size);
    }
    options
}

fn print_entry(formatter: &Formatter, info: &FileInfo, prefix: &str) {
    let display = info.name.strip_prefix(prefix).unwrap_or(&info.name);
    let display = if display.is_empty() { &info.name } else { display };

    let line = match info.action {
        Action::Folder => {
            format!("{:>30} {}", "PRE", formatter.style_folder(display))
        }
        Action::Hide => format!(
            "[{}] {:>9} {}",
            formatter.style_date(&format_timestamp(info.upload_timestamp)),
            "-",
            formatter.style_muted(&format!("{display} (hidden)"))
        ),
        Action::Start => format!(
            "[{}] {:>9} {}",
            formatter.style_date(&format_timestamp(info.upload_timestamp)),
            "-",
            formatter.style_muted(&format!("{display} (unfinished)"))
        ),
        Action::Upload => format!(
            "[{}] {:>9} {}",
            formatter.style_date(&format_timestamp(info.upload_timestamp)),
            formatter.style_size(&format_size(info.content_length)),
            display
        ),
    };
    formatter.println(&line);
}
