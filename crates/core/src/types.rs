//! Data model shared by the B2 adapter and the CLI
//!
//! These types are immutable snapshots of server state. They are built from
//! service responses and never mutated afterwards.

use std::collections::BTreeMap;

use jiff::Timestamp;
use serde::{Deserialize, Serialize};

/// Classification of a file-version record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// An unfinished large file
    Start,
    /// A stored file version
    #[default]
    Upload,
    /// A hide marker; its ID does not refer to file contents
    Hide,
    /// A virtual folder produced by a delimiter listing
    Folder,
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Action::Start => write!(f, "start"),
            Action::Upload => write!(f, "upload"),
            Action::Hide => write!(f, "hide"),
            Action::Folder => write!(f, "folder"),
        }
    }
}

impl std::str::FromStr for Action {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "start" => Ok(Action::Start),
            "upload" => Ok(Action::Upload),
            "hide" => Ok(Action::Hide),
            "folder" => Ok(Action::Folder),
            _ => Err(format!("Invalid file action: {s}")),
        }
    }
}

/// Metadata of a specific file version
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileInfo {
    pub id: String,
    pub name: String,
    /// Hex encoded SHA-1 of the contents
    pub content_sha1: String,
    pub content_length: u64,
    pub content_type: String,
    /// Values delivered through `X-Bz-Info-*` headers are always strings
    pub custom_metadata: BTreeMap<String, String>,
    pub upload_timestamp: Timestamp,
    pub action: Action,
}

impl FileInfo {
    /// True for records that refer to stored contents
    pub fn is_file(&self) -> bool {
        self.action == Action::Upload
    }
}

/// Bucket access type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BucketType {
    AllPrivate,
    AllPublic,
    Snapshot,
    #[serde(other)]
    Other,
}

impl std::fmt::Display for BucketType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BucketType::AllPrivate => write!(f, "allPrivate"),
            BucketType::AllPublic => write!(f, "allPublic"),
            BucketType::Snapshot => write!(f, "snapshot"),
            BucketType::Other => write!(f, "other"),
        }
    }
}

/// A bucket as reported by `b2_list_buckets`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketInfo {
    #[serde(rename = "bucketId")]
    pub id: String,
    #[serde(rename = "bucketName")]
    pub name: String,
    #[serde(rename = "bucketType")]
    pub bucket_type: BucketType,
}

/// Restrictions attached to the application key
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Allowed {
    #[serde(default)]
    pub capabilities: Vec<String>,
    pub bucket_id: Option<String>,
    pub bucket_name: Option<String>,
    pub name_prefix: Option<String>,
}

/// Immutable snapshot of an authenticated session
///
/// Deserialized straight from the `b2_authorize_account` response. A refresh
/// always produces a new snapshot; fields are never updated in place.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub account_id: String,
    pub authorization_token: String,
    pub api_url: String,
    pub download_url: String,
    #[serde(default)]
    pub recommended_part_size: u64,
    #[serde(default)]
    pub absolute_minimum_part_size: u64,
    #[serde(default)]
    pub allowed: Option<Allowed>,
}

impl std::fmt::Debug for SessionInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionInfo")
            .field("account_id", &self.account_id)
            .field("authorization_token", &"<redacted>")
            .field("api_url", &self.api_url)
            .field("download_url", &self.download_url)
            .field("recommended_part_size", &self.recommended_part_size)
            .field("allowed", &self.allowed)
            .finish()
    }
}

/// A single-use upload endpoint leased for one bucket
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadLease {
    pub bucket_id: String,
    pub upload_url: String,
    pub authorization_token: String,
}

impl std::fmt::Debug for UploadLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadLease")
            .field("bucket_id", &self.bucket_id)
            .field("upload_url", &self.upload_url)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_roundtrip_strings() {
        for action in [Action::Start, Action::Upload, Action::Hide, Action::Folder] {
            assert_eq!(action.to_string().parse::<Action>().unwrap(), action);
        }
        assert!("delete".parse::<Action>().is_err());
    }

    #[test]
    fn test_session_info_from_authorize_response() {
        let json = r#"{
            "accountId": "acc123",
            "authorizationToken": "tok-1",
            "apiUrl": "https://api001.backblazeb2.com",
            "downloadUrl": "https://f001.backblazeb2.com",
            "recommendedPartSize": 100000000,
            "absoluteMinimumPartSize": 5000000,
            "allowed": {
                "capabilities": ["listBuckets", "writeFiles"],
                "bucketId": null,
                "bucketName": null,
                "namePrefix": null
            }
        }"#;

        let session: SessionInfo = serde_json::from_str(json).unwrap();
        assert_eq!(session.account_id, "acc123");
        assert_eq!(session.api_url, "https://api001.backblazeb2.com");
        assert_eq!(session.recommended_part_size, 100_000_000);
        let allowed = session.allowed.clone().unwrap();
        assert_eq!(allowed.capabilities.len(), 2);
        assert!(allowed.bucket_id.is_none());

        let debug = format!("{session:?}");
        assert!(!debug.contains("tok-1"));
    }

    #[test]
    fn test_bucket_info_deserialize() {
        let json = r#"{"bucketId":"b1","bucketName":"photos","bucketType":"allPrivate","accountId":"a"}"#;
        let bucket: BucketInfo = serde_json::from_str(json).unwrap();
        assert_eq!(bucket.id, "b1");
        assert_eq!(bucket.name, "photos");
        assert_eq!(bucket.bucket_type, BucketType::AllPrivate);

        let json = r#"{"bucketId":"b2","bucketName":"x","bucketType":"restricted"}"#;
        let bucket: BucketInfo = serde_json::from_str(json).unwrap();
        assert_eq!(bucket.bucket_type, BucketType::Other);
    }

    #[test]
    fn test_upload_lease_debug_hides_token() {
        let lease: UploadLease = serde_json::from_str(
            r#"{"bucketId":"b1","uploadUrl":"https://pod/upload","authorizationToken":"secret"}"#,
        )
        .unwrap();
        assert_eq!(lease.bucket_id, "b1");
        assert!(!format!("{lease:?}").contains("secret"));
    }
}
