//! File records and single-file operations

use std::collections::BTreeMap;

use bz_core::{Action, Error, FileInfo, Result};
use jiff::Timestamp;
use serde::Deserialize;
use serde::de::IgnoredAny;

use crate::client::Client;

/// File record as the service encodes it in JSON
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct FileWire {
    #[serde(default)]
    pub file_id: Option<String>,
    pub file_name: String,
    #[serde(default)]
    pub content_sha1: Option<String>,
    #[serde(default)]
    pub content_length: u64,
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub file_info: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub upload_timestamp: i64,
    #[serde(default)]
    pub action: Action,
}

impl FileWire {
    pub(crate) fn into_file_info(self) -> Result<FileInfo> {
        let upload_timestamp = Timestamp::from_millisecond(self.upload_timestamp).map_err(|e| {
            Error::InvalidResponse(format!(
                "upload timestamp {} for {}: {e}",
                self.upload_timestamp, self.file_name
            ))
        })?;

        let custom_metadata = self
            .file_info
            .into_iter()
            .map(|(k, v)| match v {
                serde_json::Value::String(s) => (k, s),
                other => (k, other.to_string()),
            })
            .collect();

        Ok(FileInfo {
            id: self.file_id.unwrap_or_default(),
            name: self.file_name,
            // "none" is what the service reports for large files
            content_sha1: self.content_sha1.unwrap_or_default(),
            content_length: self.content_length,
            content_type: self.content_type.unwrap_or_default(),
            custom_metadata,
            upload_timestamp,
            action: self.action,
        })
    }
}

impl Client {
    /// Metadata of one file version by ID
    pub async fn get_file_info_by_id(&self, file_id: &str) -> Result<FileInfo> {
        if file_id.is_empty() {
            return Err(Error::InvalidArgument("file ID must not be empty".into()));
        }

        let wire: FileWire = self
            .api_request(
                "b2_get_file_info",
                &serde_json::json!({ "fileId": file_id }),
            )
            .await?;
        wire.into_file_info()
    }

    /// Permanently delete one file version
    pub async fn delete_file(&self, file_id: &str, file_name: &str) -> Result<()> {
        if file_id.is_empty() || file_name.is_empty() {
            return Err(Error::InvalidArgument(
                "deleting a file version needs both its ID and name".into(),
            ));
        }

        let _: IgnoredAny = self
            .api_request(
                "b2_delete_file_version",
                &serde_json::json!({ "fileId": file_id, "fileName": file_name }),
            )
            .await?;
        tracing::debug!(file_id, file_name, "Deleted file version");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_record_conversion() {
        let json = r#"{
            "accountId": "acc",
            "action": "upload",
            "bucketId": "b1",
            "contentLength": 11,
            "contentSha1": "2aae6c35c94fcfb415dbe95f408b9ce91ee846ed",
            "contentType": "text/plain",
            "fileId": "4_z27c88f1d182b150646ff0b16_f1004ba650fe24e6b_d20180809_m012345_c002_v0001001_t0000",
            "fileInfo": {"author": "unknown", "revision": 3},
            "fileName": "docs/hello.txt",
            "uploadTimestamp": 1533777245000
        }"#;

        let wire: FileWire = serde_json::from_str(json).unwrap();
        let info = wire.into_file_info().unwrap();
        assert_eq!(info.name, "docs/hello.txt");
        assert_eq!(info.content_length, 11);
        assert_eq!(info.action, Action::Upload);
        assert_eq!(info.custom_metadata["author"], "unknown");
        assert_eq!(info.custom_metadata["revision"], "3");
        assert_eq!(info.upload_timestamp.as_millisecond(), 1_533_777_245_000);
    }

    #[test]
    fn test_folder_record_has_no_id() {
        let json = r#"{"action":"folder","fileName":"photos/","fileId":null,"contentLength":0,"uploadTimestamp":0}"#;
        let info = serde_json::from_str::<FileWire>(json)
            .unwrap()
            .into_file_info()
            .unwrap();
        assert_eq!(info.action, Action::Folder);
        assert!(info.id.is_empty());
        assert!(!info.is_file());
    }
}
