//! rm command - Delete file versions
//!
//! By default only the newest version of the name is deleted, which makes
//! the previous version (if any) visible again.

use clap::Args;
use futures::StreamExt;
use serde::Serialize;

use bz_b2::{Bucket, ListOptions};
use bz_core::{Action, Error, parse_path};

use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};

/// Delete a file
#[derive(Args, Debug)]
pub struct RmArgs {
    /// File to delete (account/bucket/name)
    pub path: String,

    /// Delete every version of the name, hide markers included
    #[arg(long, conflicts_with = "id")]
    pub all_versions: bool,

    /// Delete this specific version
    #[arg(long)]
    pub id: Option<String>,

    /// Show what would be deleted without deleting it
    #[arg(short = 'n', long)]
    pub dry_run: bool,
}

#[derive(Debug, Serialize)]
struct RmOutput<'a> {
    name: &'a str,
    deleted: &'a [DeletedVersion],
    dry_run: bool,
}

#[derive(Debug, Serialize)]
struct DeletedVersion {
    id: String,
    action: Action,
}

/// Execute the rm command
pub async fn execute(args: RmArgs, output_config: OutputConfig) -> ExitCode {
    let formatter = Formatter::new(output_config);

    let path = match parse_path(&args.path) {
        Ok(p) => p,
        Err(e) => {
            formatter.error(&e.to_string());
            return ExitCode::UsageError;
        }
    };
    let name = match path.require_key() {
        Ok(k) => k.to_string(),
        Err(e) => {
            formatter.error(&e.to_string());
            return ExitCode::UsageError;
        }
    };

    let bucket = match super::open_bucket(&path, &formatter).await {
        Ok(b) => b,
        Err(code) => return code,
    };

    let targets = match select_versions(&bucket, &name, &args).await {
        Ok(t) => t,
        Err(e) => return super::report(&formatter, &e),
    };
    if targets.is_empty() {
        formatter.error(&format!("No versions of '{name}' found"));
        return ExitCode::NotFound;
    }

    let mut deleted = Vec::with_capacity(targets.len());
    for version in targets {
        if !args.dry_run
            && let Err(e) = bucket.client().delete_file(&version.id, &name).await
        {
            // Report what was removed before the failure
            print_result(&formatter, &name, &deleted, false);
            return super::report(&formatter, &e);
        }
        deleted.push(version);
    }

    print_result(&formatter, &name, &deleted, args.dry_run);
    ExitCode::Success
}

async fn select_versions(
    bucket: &Bucket,
    name: &str,
    args: &RmArgs,
) -> Result<Vec<DeletedVersion>, Error> {
    if let Some(id) = &args.id {
        return Ok(vec![DeletedVersion {
            id: id.clone(),
            action: Action::Upload,
        }]);
    }

    if !args.all_versions {
        let info = bucket.get_file_info_by_name(name).await?;
        return Ok(vec![DeletedVersion {
            id: info.id,
            action: info.action,
        }]);
    }

    let listing = bucket.list(
        ListOptions::new()
            .versions()
            .start_name(name)
            .prefix(name),
    );
    let mut stream = std::pin::pin!(listing.into_stream());
    let mut versions = Vec::new();
    while let Some(info) = stream.next().await {
        let info = info?;
        // The prefix also matches longer names, which sort after this one
        if info.name != name {
            break;
        }
        if info.action != Action::Folder {
            versions.push(DeletedVersion {
                id: info.id,
                action: info.action,
            });
        }
    }
    Ok(versions)
}

fn print_result(formatter: &Formatter, name: &str, deleted: &[DeletedVersion], dry_run: bool) {
    if formatter.is_json() {
        formatter.json(&RmOutput {
            name,
            deleted,
            dry_run,
        });
        return;
    }

    let verb = if dry_run { "Would delete" } else { "Deleted" };
    for version in deleted {
        let kind = match version.action {
            Action::Hide => " (hide marker)",
            Action::Start => " (unfinished)",
            _ => "",
        };
        formatter.success(&format!(
            "{verb} {name} {}{kind}",
            formatter.style_muted(&version.id)
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rm_output_shape() {
        let deleted = vec![
            DeletedVersion {
                id: "v2".into(),
                action: Action::Hide,
            },
            DeletedVersion {
                id: "v1".into(),
                action: Action::Upload,
            },
        ];
        let output = RmOutput {
            name: "a.txt",
            deleted: &deleted,
            dry_run: true,
        };
        let json = serde_json::to_value(&output).unwrap();
        assert_eq!(json["deleted"][0]["action"], "hide");
        assert_eq!(json["deleted"][1]["id"], "v1");
        assert_eq!(json["dry_run"], true);
    }
}
