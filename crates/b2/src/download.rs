//! Downloads
//!
//! Contents are handed back as a stream straight from the response; nothing
//! is cached. Metadata comes from the response headers, so custom metadata
//! values are always strings here.

use std::collections::BTreeMap;
use std::ops::Range;

use bytes::Bytes;
use bz_core::{Action, Error, FileInfo, Response, ResponseBody, Result};
use http::HeaderMap;
use jiff::Timestamp;

use crate::API_PATH;
use crate::client::Client;
use crate::upload::encode_file_name;

const INFO_HEADER_PREFIX: &str = "x-bz-info-";

/// What to download
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DownloadOptions {
    /// Download by file ID; takes precedence over the name
    pub file_id: Option<String>,
    /// Bucket name, required with `file_name`
    pub bucket: Option<String>,
    pub file_name: Option<String>,
    /// Half-open byte range `start..end`
    pub range: Option<Range<u64>>,
}

impl DownloadOptions {
    pub fn by_id(file_id: impl Into<String>) -> Self {
        Self {
            file_id: Some(file_id.into()),
            ..Self::default()
        }
    }

    pub fn by_name(bucket: impl Into<String>, file_name: impl Into<String>) -> Self {
        Self {
            bucket: Some(bucket.into()),
            file_name: Some(file_name.into()),
            ..Self::default()
        }
    }

    pub fn range(mut self, range: Range<u64>) -> Self {
        self.range = Some(range);
        self
    }

    /// `Range` header value, validated
    fn range_header(&self) -> Result<Option<String>> {
        match &self.range {
            None => Ok(None),
            Some(r) if r.end <= r.start => Err(Error::InvalidArgument(format!(
                "empty byte range {}..{}",
                r.start, r.end
            ))),
            Some(r) => Ok(Some(format!("bytes={}-{}", r.start, r.end - 1))),
        }
    }

    fn target(&self) -> Result<Target<'_>> {
        if let Some(id) = self.file_id.as_deref().filter(|id| !id.is_empty()) {
            return Ok(Target::Id(id));
        }
        match (self.bucket.as_deref(), self.file_name.as_deref()) {
            (_, None) | (_, Some("")) => Err(Error::InvalidArgument(
                "a file ID or a file name is required".into(),
            )),
            (None, Some(_)) | (Some(""), Some(_)) => Err(Error::InvalidArgument(
                "a bucket name is required when downloading by file name".into(),
            )),
            (Some(bucket), Some(file_name)) => Ok(Target::Name { bucket, file_name }),
        }
    }
}

enum Target<'a> {
    Id(&'a str),
    Name { bucket: &'a str, file_name: &'a str },
}

/// An open download
#[derive(Debug)]
pub struct Download {
    /// Metadata recovered from the response headers
    pub info: FileInfo,
    /// The contents, or the requested range of them
    pub body: ResponseBody,
}

impl Download {
    /// Read the whole body into memory
    pub async fn bytes(self) -> Result<Bytes> {
        self.body.bytes().await
    }
}

impl Client {
    /// Download a file by ID or by bucket and name
    pub async fn download_file(&self, options: DownloadOptions) -> Result<Download> {
        let target = options.target()?;
        let range = options.range_header()?;

        let response = match target {
            Target::Id(file_id) => {
                let query = urlencoding::encode(file_id).into_owned();
                self.get_with_auth(
                    |s| {
                        format!(
                            "{}{API_PATH}b2_download_file_by_id?fileId={query}",
                            s.download_url.trim_end_matches('/')
                        )
                    },
                    range.as_deref(),
                )
                .await
            }
            Target::Name { bucket, file_name } => {
                let path = format!("{bucket}/{}", encode_file_name(file_name));
                self.get_with_auth(
                    |s| format!("{}/file/{path}", s.download_url.trim_end_matches('/')),
                    range.as_deref(),
                )
                .await
            }
        };

        let response = response.inspect_err(|e| tracing::debug!(error = %e, "Download failed"))?;
        into_download(response)
    }

    pub async fn download_file_by_id(&self, file_id: &str) -> Result<Download> {
        self.download_file(DownloadOptions::by_id(file_id)).await
    }

    pub async fn download_file_by_name(&self, bucket: &str, file_name: &str) -> Result<Download> {
        self.download_file(DownloadOptions::by_name(bucket, file_name))
            .await
    }
}

fn into_download(response: Response) -> Result<Download> {
    let info = file_info_from_headers(&response.headers)?;
    tracing::debug!(name = %info.name, sha1 = %info.content_sha1, "Download started");

    Ok(Download {
        info,
        body: response.body,
    })
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

fn required_header<'a>(headers: &'a HeaderMap, name: &str) -> Result<&'a str> {
    header(headers, name)
        .ok_or_else(|| Error::InvalidResponse(format!("download response has no {name} header")))
}

pub(crate) fn file_info_from_headers(headers: &HeaderMap) -> Result<FileInfo> {
    let raw_name = header(headers, "x-bz-file-name").unwrap_or_default();
    let name = urlencoding::decode(raw_name)
        .map(|n| n.into_owned())
        .unwrap_or_else(|_| raw_name.to_string());

    let content_length = required_header(headers, "content-length")?
        .parse::<u64>()
        .map_err(|e| Error::InvalidResponse(format!("Content-Length: {e}")))?;

    let ms = required_header(headers, "x-bz-upload-timestamp")?
        .parse::<i64>()
        .map_err(|e| Error::InvalidResponse(format!("X-Bz-Upload-Timestamp: {e}")))?;
    let upload_timestamp = Timestamp::from_millisecond(ms)
        .map_err(|e| Error::InvalidResponse(format!("X-Bz-Upload-Timestamp: {e}")))?;

    let mut custom_metadata = BTreeMap::new();
    for (name, value) in headers {
        let Some(key) = name.as_str().strip_prefix(INFO_HEADER_PREFIX) else {
            continue;
        };
        let value = value
            .to_str()
            .ok()
            .and_then(|v| urlencoding::decode(v).ok())
            .ok_or_else(|| {
                Error::InvalidResponse(format!("metadata {key:?} is not a percent-encoded UTF-8 value"))
            })?;
        custom_metadata.insert(key.to_string(), value.into_owned());
    }

    Ok(FileInfo {
        id: header(headers, "x-bz-file-id").unwrap_or_default().to_string(),
        name,
        content_sha1: header(headers, "x-bz-content-sha1")
            .unwrap_or_default()
            .to_string(),
        content_length,
        content_type: header(headers, "content-type")
            .unwrap_or_default()
            .to_string(),
        custom_metadata,
        upload_timestamp,
        action: Action::Upload,
    })
}
