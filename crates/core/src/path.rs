//! Remote path parsing
//!
//! Remote paths have the form `account[/bucket[/name]]`. Everything after the
//! bucket segment is the file name, slashes included.

use serde::Serialize;

use crate::error::{Error, Result};

/// A parsed `account/bucket/name` path
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemotePath {
    pub account: String,
    /// Empty when the path names only an account
    pub bucket: String,
    /// File name or prefix, empty for the bucket root
    pub key: String,
}

impl RemotePath {
    pub fn new(
        account: impl Into<String>,
        bucket: impl Into<String>,
        key: impl Into<String>,
    ) -> Self {
        Self {
            account: account.into(),
            bucket: bucket.into(),
            key: key.into(),
        }
    }

    /// Fail unless the path names a bucket
    pub fn require_bucket(&self) -> Result<&str> {
        if self.bucket.is_empty() {
            return Err(Error::InvalidPath(format!(
                "'{self}' does not name a bucket (expected account/bucket)"
            )));
        }
        Ok(&self.bucket)
    }

    /// Fail unless the path names a file inside a bucket
    pub fn require_key(&self) -> Result<&str> {
        self.require_bucket()?;
        if self.key.is_empty() || self.key.ends_with('/') {
            return Err(Error::InvalidPath(format!(
                "'{self}' does not name a file (expected account/bucket/name)"
            )));
        }
        Ok(&self.key)
    }
}

impl std::fmt::Display for RemotePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.account)?;
        if !self.bucket.is_empty() {
            write!(f, "/{}", self.bucket)?;
        }
        if !self.key.is_empty() {
            write!(f, "/{}", self.key)?;
        }
        Ok(())
    }
}

/// Parse `account[/bucket[/name]]`
pub fn parse_path(path: &str) -> Result<RemotePath> {
    if path.is_empty() {
        return Err(Error::InvalidPath("path cannot be empty".into()));
    }

    let mut parts = path.splitn(3, '/');
    let account = parts.next().unwrap_or_default();
    let bucket = parts.next().unwrap_or_default();
    let key = parts.next().unwrap_or_default();

    if account.is_empty() {
        return Err(Error::InvalidPath(format!(
            "'{path}' is missing the account name"
        )));
    }
    if bucket.is_empty() && !key.is_empty() {
        return Err(Error::InvalidPath(format!("'{path}' has an empty bucket name")));
    }

    Ok(RemotePath::new(account, bucket, key))
}
