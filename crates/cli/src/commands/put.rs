//! put command - Upload a local file or stdin
//!
//! A destination ending in `/` is treated as a prefix and the source's file
//! name is appended to it.

use std::path::Path;
use std::time::Duration;

use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;

use bz_b2::{AUTO_CONTENT_TYPE, UploadOptions, UploadSource};
use bz_core::{FileInfo, RemotePath, parse_path};

use crate::exit_code::ExitCode;
use crate::output::formatter::format_size;
use crate::output::{Formatter, OutputConfig};

/// Upload a file
#[derive(Args, Debug)]
pub struct PutArgs {
    /// Local file, or `-` for stdin
    pub source: String,

    /// Destination (account/bucket/name, or account/bucket/prefix/)
    pub target: String,

    /// Content type; guessed from the file extension when omitted
    #[arg(long)]
    pub content_type: Option<String>,

    /// Custom metadata as KEY=VALUE, repeatable (at most 10)
    #[arg(long = "meta", value_parser = parse_metadata)]
    pub metadata: Vec<(String, String)>,

    /// Precomputed hex SHA-1 of the contents
    #[arg(long)]
    pub sha1: Option<String>,
}

#[derive(Debug, Serialize)]
struct PutOutput {
    source: String,
    target: String,
    file: FileInfo,
}

fn parse_metadata(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((k, v)) if !k.is_empty() => Ok((k.to_string(), v.to_string())),
        _ => Err(format!("invalid metadata '{s}', expected KEY=VALUE")),
    }
}

/// Execute the put command
pub async fn execute(args: PutArgs, output_config: OutputConfig) -> ExitCode {
    let formatter = Formatter::new(output_config);

    let path = match parse_path(&args.target) {
        Ok(p) => p,
        Err(e) => {
            formatter.error(&e.to_string());
            return ExitCode::UsageError;
        }
    };

    let name = match target_name(&path, &args.source) {
        Ok(n) => n,
        Err(msg) => {
            formatter.error(&msg);
            return ExitCode::UsageError;
        }
    };

    let source = if args.source == "-" {
        UploadSource::reader(tokio::io::stdin())
    } else {
        match UploadSource::open(&args.source).await {
            Ok(s) => s,
            Err(e) => {
                formatter.error(&format!("Failed to open '{}': {e}", args.source));
                return ExitCode::UsageError;
            }
        }
    };

    let bucket = match super::open_bucket(&path, &formatter).await {
        Ok(b) => b,
        Err(code) => return code,
    };

    let options = upload_options(&args);
    let spinner = formatter.show_progress().then(|| {
        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
            pb.set_style(style);
        }
        pb.set_message(format!("Uploading {name}"));
        pb.enable_steady_tick(Duration::from_millis(100));
        pb
    });

    let result = bucket.upload(source, &name, options).await;
    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }

    let info = match result {
        Ok(info) => info,
        Err(e) => return super::report(&formatter, &e),
    };

    let target = format!("{}/{}/{}", path.account, bucket.name(), info.name);
    if formatter.is_json() {
        formatter.json(&PutOutput {
            source: args.source,
            target,
            file: info,
        });
    } else {
        let size = formatter.style_size(&format_size(info.content_length));
        formatter.success(&format!("{} -> {target} ({size})", args.source));
    }
    ExitCode::Success
}

/// File name inside the bucket for this upload
fn target_name(path: &RemotePath, source: &str) -> Result<String, String> {
    if path.bucket.is_empty() {
        return Err(format!("'{path}' does not name a bucket (expected account/bucket/name)"));
    }
    if !path.key.is_empty() && !path.key.ends_with('/') {
        return Ok(path.key.clone());
    }
    if source == "-" {
        return Err("uploading stdin requires a full destination name".to_string());
    }
    let base = Path::new(source)
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| format!("cannot derive a file name from '{source}'"))?;
    Ok(format!("{}{base}", path.key))
}

fn upload_options(args: &PutArgs) -> UploadOptions {
    let content_type = args
        .content_type
        .clone()
        .or_else(|| {
            (args.source != "-")
                .then(|| mime_guess::from_path(&args.source).first_raw())
                .flatten()
                .map(str::to_string)
        })
        .unwrap_or_else(|| AUTO_CONTENT_TYPE.to_string());

    let mut options = UploadOptions::new().content_type(content_type);
    for (key, value) in &args.metadata {
        options = options.metadata(key, value);
    }
    if let Some(sha1) = &args.sha1 {
        options = options.sha1(sha1);
    }
    options
}
