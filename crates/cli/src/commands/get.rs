//! get command - Download a file
//!
//! Whole-file downloads are checked against the SHA-1 the service stored at
//! upload time. Ranged downloads cannot be checked and are written as-is.

use std::ops::Range;
use std::path::Path;

use anyhow::{Context, bail};
use clap::Args;
use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use sha1::{Digest, Sha1};
use tokio::io::{AsyncWrite, AsyncWriteExt};

use bz_b2::{Download, DownloadOptions};
use bz_core::{FileInfo, parse_path};

use crate::exit_code::ExitCode;
use crate::output::formatter::format_size;
use crate::output::{Formatter, OutputConfig};

/// Download a file
#[derive(Args, Debug)]
pub struct GetArgs {
    /// Remote file (account/bucket/name); only the account with --id
    pub source: String,

    /// Local destination, `-` for stdout; defaults to the file's base name
    pub target: Option<String>,

    /// Download this file version by ID instead of by name
    #[arg(long)]
    pub id: Option<String>,

    /// Half-open byte range START..END
    #[arg(long, value_parser = parse_range)]
    pub range: Option<Range<u64>>,
}

#[derive(Debug, Serialize)]
struct GetOutput {
    target: String,
    bytes_written: u64,
    verified: bool,
    file: FileInfo,
}

fn parse_range(s: &str) -> Result<Range<u64>, String> {
    let (start, end) = s
        .split_once("..")
        .ok_or_else(|| format!("invalid range '{s}', expected START..END"))?;
    let start = start
        .parse::<u64>()
        .map_err(|e| format!("invalid range start '{start}': {e}"))?;
    let end = end
        .parse::<u64>()
        .map_err(|e| format!("invalid range end '{end}': {e}"))?;
    if end <= start {
        return Err(format!("range '{s}' is empty"));
    }
    Ok(start..end)
}

/// Execute the get command
pub async fn execute(args: GetArgs, output_config: OutputConfig) -> ExitCode {
    let formatter = Formatter::new(output_config);

    let path = match parse_path(&args.source) {
        Ok(p) => p,
        Err(e) => {
            formatter.error(&e.to_string());
            return ExitCode::UsageError;
        }
    };

    let mut options = match &args.id {
        Some(id) => DownloadOptions::by_id(id),
        None => match path.require_key() {
            Ok(key) => DownloadOptions::by_name(&path.bucket, key),
            Err(e) => {
                formatter.error(&e.to_string());
                return ExitCode::UsageError;
            }
        },
    };
    if let Some(range) = args.range.clone() {
        options = options.range(range);
    }

    let client = match super::connect(&path.account, &formatter).await {
        Ok(c) => c,
        Err(code) => return code,
    };

    let download = match client.download_file(options).await {
        Ok(d) => d,
        Err(e) => return super::report(&formatter, &e),
    };

    let target = args
        .target
        .clone()
        .unwrap_or_else(|| default_target(&download.info.name));
    let info = download.info.clone();
    let verify = args.range.is_none() && is_sha1_hex(&info.content_sha1);
    if args.range.is_none() && !verify {
        formatter.warning(&format!(
            "'{}' has no stored SHA-1 ({}); contents will not be verified",
            info.name, info.content_sha1
        ));
    }

    let result = save(download, &target, verify, &formatter).await;
    let bytes_written = match result {
        Ok(n) => n,
        Err(e) => {
            formatter.error(&format!("{e:#}"));
            return ExitCode::GeneralError;
        }
    };

    if formatter.is_json() {
        formatter.json(&GetOutput {
            target,
            bytes_written,
            verified: verify,
            file: info,
        });
    } else if target != "-" {
        let size = formatter.style_size(&format_size(bytes_written));
        formatter.success(&format!("{} -> {target} ({size})", info.name));
    }
    ExitCode::Success
}

/// Base name of a remote file, for saving it in the current directory
fn default_target(name: &str) -> String {
    let base = name.rsplit('/').next().unwrap_or(name);
    if base.is_empty() {
        name.replace('/', "_")
    } else {
        base.to_string()
    }
}

fn is_sha1_hex(s: &str) -> bool {
    s.len() == 40 && s.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Copy the body to `target`, returning the number of bytes written
async fn save(
    download: Download,
    target: &str,
    verify: bool,
    formatter: &Formatter,
) -> anyhow::Result<u64> {
    let to_stdout = target == "-";
    let mut writer: Box<dyn AsyncWrite + Send + Unpin> = if to_stdout {
        Box::new(tokio::io::stdout())
    } else {
        let file = tokio::fs::File::create(target)
            .await
            .with_context(|| format!("Failed to create '{target}'"))?;
        Box::new(file)
    };

    let progress = (!to_stdout && formatter.show_progress()).then(|| {
        let pb = ProgressBar::new(download.info.content_length);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {bytes}/{total_bytes} {msg}")
        {
            pb.set_style(style.progress_chars("#>-"));
        }
        pb.set_message(download.info.name.clone());
        pb
    });

    let result = copy_body(download, writer.as_mut(), progress.as_ref(), verify).await;
    if let Some(pb) = &progress {
        pb.finish_and_clear();
    }

    if result.is_err() && !to_stdout {
        // Leave no truncated or corrupt file behind
        drop(writer);
        let _ = tokio::fs::remove_file(Path::new(target)).await;
    }
    result.with_context(|| format!("Failed to download to '{target}'"))
}

async fn copy_body(
    download: Download,
    writer: &mut (dyn AsyncWrite + Send + Unpin),
    progress: Option<&ProgressBar>,
    verify: bool,
) -> anyhow::Result<u64> {
    let expected = download.info.content_sha1;
    let mut hasher = Sha1::new();
    let mut written = 0u64;

    let mut body = download.body;
    while let Some(chunk) = body.next().await {
        let chunk = chunk.context("Connection lost while reading the body")?;
        writer.write_all(&chunk).await?;
        if verify {
            hasher.update(&chunk);
        }
        written += chunk.len() as u64;
        if let Some(pb) = progress {
            pb.set_position(written);
        }
    }
    writer.flush().await?;

    if verify {
        let actual = hex::encode(hasher.finalize());
        if !actual.eq_ignore_ascii_case(&expected) {
            bail!("SHA-1 mismatch: expected {expected}, got {actual}");
        }
    }
    Ok(written)
}
