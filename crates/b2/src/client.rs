//! B2 client handle
//!
//! [`Client`] ties together the transport, the authentication session and
//! the upload-URL pool. It is a cheap `Arc` handle: clone it into as many
//! tasks as needed, every clone shares the same session and leases.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use bz_core::{
    Account, Body, DEFAULT_UPLOAD_ATTEMPTS, Defaults, MAX_PAGE_SIZE, Request, Response, Result,
    SessionInfo, Transport, UploadLease,
};
use serde::de::DeserializeOwned;

use crate::API_PATH;
use crate::pool::UploadUrlPool;
use crate::session::{Credentials, Session};
use crate::transport::{ReqwestTransport, TransportOptions};

/// Tunables for a [`Client`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientOptions {
    /// Attempts an upload makes before surfacing a 401
    pub upload_attempts: u32,
    /// Per-request timeout; `None` waits indefinitely
    pub timeout: Option<Duration>,
    /// Accept invalid TLS certificates
    pub insecure: bool,
    /// Default page size for listings
    pub page_size: u32,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            upload_attempts: DEFAULT_UPLOAD_ATTEMPTS,
            timeout: None,
            insecure: false,
            page_size: MAX_PAGE_SIZE,
        }
    }
}

impl ClientOptions {
    /// Build options from the `[defaults]` table of the config file
    pub fn from_defaults(defaults: &Defaults) -> Self {
        Self {
            upload_attempts: defaults.upload_attempts.max(1),
            timeout: (defaults.timeout_secs > 0).then(|| Duration::from_secs(defaults.timeout_secs)),
            insecure: false,
            page_size: defaults.page_size.clamp(1, MAX_PAGE_SIZE),
        }
    }
}

struct ClientInner {
    transport: Arc<dyn Transport>,
    session: Session,
    upload_urls: UploadUrlPool,
    options: ClientOptions,
}

/// Handle to one authorized B2 account
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

impl Client {
    /// Authorize `account` over HTTPS
    pub async fn connect(account: &Account, mut options: ClientOptions) -> Result<Self> {
        options.insecure |= account.insecure;
        let transport = ReqwestTransport::new(&TransportOptions {
            timeout: options.timeout,
            insecure: options.insecure,
        })?;

        Self::with_transport(Credentials::from(account), Arc::new(transport), options).await
    }

    /// Authorize through a caller supplied transport
    pub async fn with_transport(
        credentials: Credentials,
        transport: Arc<dyn Transport>,
        options: ClientOptions,
    ) -> Result<Self> {
        let session = Session::authorize(transport.clone(), credentials).await?;

        Ok(Self {
            inner: Arc::new(ClientInner {
                transport,
                session,
                upload_urls: UploadUrlPool::new(),
                options,
            }),
        })
    }

    pub fn session(&self) -> &Session {
        &self.inner.session
    }

    /// Snapshot of the current login
    pub fn login_info(&self) -> Arc<SessionInfo> {
        self.inner.session.current()
    }

    pub fn options(&self) -> &ClientOptions {
        &self.inner.options
    }

    pub(crate) fn transport(&self) -> &dyn Transport {
        self.inner.transport.as_ref()
    }

    pub(crate) fn upload_urls(&self) -> &UploadUrlPool {
        &self.inner.upload_urls
    }

    /// POST a JSON control-plane request and decode the response.
    ///
    /// A 401 refreshes the session once, keyed on the token that was
    /// rejected, and the request is sent again with the new token.
    pub(crate) async fn api_request<T: DeserializeOwned>(
        &self,
        operation: &str,
        payload: &serde_json::Value,
    ) -> Result<T> {
        let body = Bytes::from(serde_json::to_vec(payload)?);
        let session = self.login_info();

        match self.post_json(&session, operation, body.clone()).await {
            Err(e) if e.is_unauthorized() => {
                tracing::debug!(operation, "Authorization rejected, refreshing session");
                self.inner
                    .session
                    .refresh(Some(&session.authorization_token))
                    .await?;
                self.post_json(&self.login_info(), operation, body).await
            }
            other => other,
        }
    }

    async fn post_json<T: DeserializeOwned>(
        &self,
        session: &SessionInfo,
        operation: &str,
        body: Bytes,
    ) -> Result<T> {
        let url = format!(
            "{}{API_PATH}{operation}",
            session.api_url.trim_end_matches('/')
        );
        let request = Request::post(url)
            .header("Authorization", &session.authorization_token)?
            .header("Content-Type", "application/json")?
            .body(Body::Bytes(body));

        tracing::debug!(operation, "Sending B2 API request");
        self.transport()
            .send(request)
            .await?
            .error_for_status()
            .await?
            .json()
            .await
    }

    /// Authorized GET against a URL derived from the current session.
    ///
    /// The URL is rebuilt after a refresh since the download host may move.
    pub(crate) async fn get_with_auth<F>(&self, url_for: F, range: Option<&str>) -> Result<Response>
    where
        F: Fn(&SessionInfo) -> String,
    {
        let session = self.login_info();

        match self.send_get(&session, &url_for, range).await {
            Err(e) if e.is_unauthorized() => {
                tracing::debug!("Download authorization rejected, refreshing session");
                self.inner
                    .session
                    .refresh(Some(&session.authorization_token))
                    .await?;
                self.send_get(&self.login_info(), &url_for, range).await
            }
            other => other,
        }
    }

    async fn send_get<F>(&self, session: &SessionInfo, url_for: &F, range: Option<&str>) -> Result<Response>
    where
        F: Fn(&SessionInfo) -> String,
    {
        let mut request =
            Request::get(url_for(session)).header("Authorization", &session.authorization_token)?;
        if let Some(range) = range {
            request = request.header("Range", range)?;
        }

        self.transport().send(request).await?.error_for_status().await
    }

    /// Take a cached upload URL for `bucket_id` or ask the service for one
    pub(crate) async fn lease_upload_url(&self, bucket_id: &str) -> Result<UploadLease> {
        if let Some(lease) = self.inner.upload_urls.pop(bucket_id) {
            tracing::debug!(bucket_id, "Reusing cached upload URL");
            return Ok(lease);
        }

        tracing::debug!(bucket_id, "Requesting new upload URL");
        self.api_request(
            "b2_get_upload_url",
            &serde_json::json!({ "bucketId": bucket_id }),
        )
        .await
    }

    /// Return a lease that just completed an upload
    pub(crate) fn release_upload_url(&self, lease: UploadLease) {
        self.inner.upload_urls.push(lease);
    }

    /// Forget every cached upload URL for `bucket_id`
    pub(crate) fn invalidate_upload_urls(&self, bucket_id: &str) {
        let dropped = self.inner.upload_urls.invalidate(bucket_id);
        if dropped > 0 {
            tracing::warn!(bucket_id, dropped, "Discarded cached upload URLs after authorization failure");
        }
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("session", &self.inner.session)
            .field("options", &self.inner.options)
            .finish_non_exhaustive()
    }
}
