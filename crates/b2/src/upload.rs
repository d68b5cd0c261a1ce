//! Uploads
//!
//! [`Bucket::upload`] hashes its input once, then sends it through leased
//! upload URLs, refreshing authorization and retrying when the service
//! answers 401. [`Bucket::upload_with_sha1`] is the single-shot variant for
//! callers that already know the hash and cannot afford buffering.

use std::collections::BTreeMap;

use bz_core::{Body, Error, FileInfo, Request, Result, UploadLease, retry_on_unauthorized};
use tokio::io::AsyncRead;

use crate::bucket::Bucket;
use crate::checksum::{PreparedBody, UploadSource, exact_length_stream};
use crate::file::FileWire;

/// Content type that asks the service to guess from the file name
pub const AUTO_CONTENT_TYPE: &str = "b2/x-auto";

/// Most `X-Bz-Info-*` headers a file may carry
pub const MAX_METADATA_ENTRIES: usize = 10;

/// Per-upload settings
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadOptions {
    /// MIME type; `b2/x-auto` when unset
    pub content_type: Option<String>,
    /// Custom metadata sent as `X-Bz-Info-<key>`
    pub metadata: BTreeMap<String, String>,
    /// Hex SHA-1 of the contents, when already known
    pub sha1: Option<String>,
}

impl UploadOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn sha1(mut self, sha1: impl Into<String>) -> Self {
        self.sha1 = Some(sha1.into());
        self
    }

    fn content_type_or_auto(&self) -> &str {
        self.content_type.as_deref().unwrap_or(AUTO_CONTENT_TYPE)
    }
}

impl Bucket {
    /// Upload `source` as a new version of `name`.
    ///
    /// Buffers, seekable readers and plain readers are all accepted; see
    /// [`UploadSource`] for what each costs. A 401 discards the upload URL,
    /// forces a fresh login and tries again, up to the client's attempt
    /// budget. Any other failure is returned immediately.
    pub async fn upload(
        &self,
        source: impl Into<UploadSource>,
        name: &str,
        options: UploadOptions,
    ) -> Result<FileInfo> {
        validate_file_name(name)?;
        validate_metadata(&options.metadata)?;

        let body = match &options.sha1 {
            Some(sha1) => PreparedBody::with_known_sha1(source.into(), sha1.clone()).await?,
            None => PreparedBody::prepare(source.into()).await?,
        };
        tracing::debug!(
            bucket = %self.name(),
            name,
            length = body.len(),
            sha1 = %body.sha1(),
            "Prepared upload"
        );

        let attempts = self.client().options().upload_attempts;
        retry_on_unauthorized(
            attempts,
            |attempt| self.upload_attempt(&body, name, &options, attempt),
            || self.client().session().refresh(None),
        )
        .await
    }

    async fn upload_attempt(
        &self,
        body: &PreparedBody,
        name: &str,
        options: &UploadOptions,
        attempt: u32,
    ) -> Result<FileInfo> {
        let request_body = body.request_body().await?;
        let lease = self.client().lease_upload_url(self.id()).await?;

        tracing::debug!(bucket = %self.name(), name, attempt, "Uploading file");
        match self
            .send_upload(&lease, name, body.sha1(), options, request_body)
            .await
        {
            Ok(info) => {
                self.client().release_upload_url(lease);
                Ok(info)
            }
            Err(e) => {
                // Sibling leases were issued under the same expired login
                if e.is_unauthorized() {
                    self.client().invalidate_upload_urls(self.id());
                }
                Err(e)
            }
        }
    }

    /// Upload exactly `length` bytes from `reader` in a single attempt.
    ///
    /// Nothing is buffered and nothing is retried; `sha1` is trusted as
    /// given. The upload URL is still leased from and returned to the pool.
    pub async fn upload_with_sha1<R>(
        &self,
        reader: R,
        name: &str,
        sha1: &str,
        length: u64,
        options: UploadOptions,
    ) -> Result<FileInfo>
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        validate_file_name(name)?;
        validate_metadata(&options.metadata)?;
        if sha1.len() != 40 || !sha1.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(Error::InvalidArgument(format!(
                "'{sha1}' is not a hex encoded SHA-1"
            )));
        }

        let lease = self.client().lease_upload_url(self.id()).await?;
        let body = Body::Stream {
            length,
            stream: exact_length_stream(reader, length),
        };

        match self.send_upload(&lease, name, sha1, &options, body).await {
            Ok(info) => {
                self.client().release_upload_url(lease);
                Ok(info)
            }
            Err(e) => {
                if e.is_unauthorized() {
                    self.client().invalidate_upload_urls(self.id());
                }
                Err(e)
            }
        }
    }

    async fn send_upload(
        &self,
        lease: &UploadLease,
        name: &str,
        sha1: &str,
        options: &UploadOptions,
        body: Body,
    ) -> Result<FileInfo> {
        let mut request = Request::post(&lease.upload_url)
            .header("Authorization", &lease.authorization_token)?
            .header("X-Bz-File-Name", &encode_file_name(name))?
            .header("Content-Type", options.content_type_or_auto())?
            .header("X-Bz-Content-Sha1", sha1)?;
        // Header values must be ASCII; B2 stores the percent-encoded form
        for (key, value) in &options.metadata {
            request = request.header(&format!("X-Bz-Info-{key}"), &urlencoding::encode(value))?;
        }

        let wire: FileWire = self
            .client()
            .transport()
            .send(request.body(body))
            .await?
            .error_for_status()
            .await?
            .json()
            .await?;
        wire.into_file_info()
    }
}

/// Percent-encode a file name for the `X-Bz-File-Name` header.
///
/// Slashes separate path segments in B2 names and are sent as-is.
pub(crate) fn encode_file_name(name: &str) -> String {
    urlencoding::encode(name).replace("%2F", "/")
}

fn validate_file_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::InvalidArgument("file name must not be empty".into()));
    }
    if name.len() > 1024 {
        return Err(Error::InvalidArgument(format!(
            "file name is {} bytes, the limit is 1024",
            name.len()
        )));
    }
    Ok(())
}

fn validate_metadata(metadata: &BTreeMap<String, String>) -> Result<()> {
    if metadata.len() > MAX_METADATA_ENTRIES {
        return Err(Error::InvalidArgument(format!(
            "{} metadata entries given, at most {MAX_METADATA_ENTRIES} are allowed",
            metadata.len()
        )));
    }
    if let Some(key) = metadata.keys().find(|k| k.is_empty()) {
        return Err(Error::InvalidArgument(format!("invalid metadata key {key:?}")));
    }
    Ok(())
}
