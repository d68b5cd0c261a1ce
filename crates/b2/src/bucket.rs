//! Buckets

use bz_core::{BucketInfo, BucketType, Error, Result};
use serde::Deserialize;
use serde::de::IgnoredAny;

use crate::client::Client;

#[derive(Debug, Deserialize)]
struct ListBucketsResponse {
    buckets: Vec<BucketInfo>,
}

/// A bucket bound to the client that found it
#[derive(Debug, Clone)]
pub struct Bucket {
    client: Client,
    info: BucketInfo,
}

impl Bucket {
    pub fn id(&self) -> &str {
        &self.info.id
    }

    pub fn name(&self) -> &str {
        &self.info.name
    }

    pub fn bucket_type(&self) -> BucketType {
        self.info.bucket_type
    }

    pub fn info(&self) -> &BucketInfo {
        &self.info
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Delete the bucket. It must be empty.
    pub async fn delete(self) -> Result<()> {
        let account_id = self.client.login_info().account_id.clone();
        let _: IgnoredAny = self
            .client
            .api_request(
                "b2_delete_bucket",
                &serde_json::json!({ "accountId": account_id, "bucketId": self.info.id }),
            )
            .await?;
        self.client.invalidate_upload_urls(&self.info.id);
        tracing::debug!(bucket = %self.info.name, "Deleted bucket");
        Ok(())
    }
}

impl Client {
    /// Wrap an already known bucket without a round trip
    pub fn bucket(&self, info: BucketInfo) -> Bucket {
        Bucket {
            client: self.clone(),
            info,
        }
    }

    /// List buckets visible to this key, optionally only the one named
    pub async fn buckets(&self, name: Option<&str>) -> Result<Vec<Bucket>> {
        let session = self.login_info();
        let mut payload = serde_json::json!({ "accountId": session.account_id });

        // Keys restricted to one bucket must name it in the request
        if let Some(allowed_id) = session.allowed.as_ref().and_then(|a| a.bucket_id.as_ref()) {
            payload["bucketId"] = serde_json::Value::String(allowed_id.clone());
        }
        if let Some(name) = name {
            payload["bucketName"] = serde_json::Value::String(name.to_string());
        }

        let response: ListBucketsResponse = self.api_request("b2_list_buckets", &payload).await?;
        Ok(response
            .buckets
            .into_iter()
            .map(|info| self.bucket(info))
            .collect())
    }

    /// Create a bucket
    pub async fn create_bucket(&self, name: &str, public: bool) -> Result<Bucket> {
        validate_bucket_name(name)?;

        let bucket_type = if public { "allPublic" } else { "allPrivate" };
        let info: BucketInfo = self
            .api_request(
                "b2_create_bucket",
                &serde_json::json!({
                    "accountId": self.login_info().account_id,
                    "bucketName": name,
                    "bucketType": bucket_type,
                }),
            )
            .await?;

        tracing::debug!(bucket = %info.name, bucket_type, "Created bucket");
        Ok(self.bucket(info))
    }

    /// Find a bucket by name, creating a private one when asked to
    pub async fn bucket_by_name(&self, name: &str, create: bool) -> Result<Bucket> {
        validate_bucket_name(name)?;

        if let Some(bucket) = self
            .buckets(Some(name))
            .await?
            .into_iter()
            .find(|b| b.name() == name)
        {
            return Ok(bucket);
        }

        if create {
            self.create_bucket(name, false).await
        } else {
            Err(Error::BucketNotFound(name.to_string()))
        }
    }
}

fn validate_bucket_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::InvalidArgument("bucket name must not be empty".into()));
    }
    if !name.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-') {
        return Err(Error::InvalidArgument(format!(
            "bucket name '{name}' may only contain letters, digits and '-'"
        )));
    }
    Ok(())
}
