//! reqwest-backed transport
//!
//! Wraps `reqwest::Client` and implements the `Transport` trait from bz-core.

use std::time::Duration;

use async_trait::async_trait;
use bz_core::{Body, Error, Request, Response, ResponseBody, Result, Transport};
use futures::{StreamExt, TryStreamExt};
use http::header::CONTENT_LENGTH;

/// Settings for the HTTP client
#[derive(Debug, Clone, Default)]
pub struct TransportOptions {
    /// Whole-request timeout, `None` for no limit
    pub timeout: Option<Duration>,
    /// Accept invalid TLS certificates
    pub insecure: bool,
}

/// Production transport
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    inner: reqwest::Client,
}

impl ReqwestTransport {
    /// Build a transport with its own connection pool
    pub fn new(options: &TransportOptions) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .user_agent(concat!("bz/", env!("CARGO_PKG_VERSION")))
            .danger_accept_invalid_certs(options.insecure);

        if let Some(timeout) = options.timeout {
            builder = builder.timeout(timeout);
        }

        let client = builder
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self { inner: client })
    }

    /// Wrap an already configured client
    pub fn from_client(client: reqwest::Client) -> Self {
        Self { inner: client }
    }

    /// Get the underlying reqwest client
    pub fn inner(&self) -> &reqwest::Client {
        &self.inner
    }

    /// Map a reqwest error into the bz error taxonomy
    fn map_error(error: reqwest::Error) -> Error {
        if error.is_timeout() {
            return Error::Timeout(error.to_string());
        }

        let mut msg = error.to_string();
        // reqwest hides the interesting part (DNS, TLS, refused) in the source chain
        let mut source = std::error::Error::source(&error);
        while let Some(cause) = source {
            msg.push_str(": ");
            msg.push_str(&cause.to_string());
            source = cause.source();
        }
        Error::Network(msg)
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: Request) -> Result<Response> {
        let Request {
            method,
            url,
            headers,
            body,
        } = request;

        let length = body.len();
        let mut builder = self.inner.request(method, &url).headers(headers);

        builder = match body {
            Body::Empty => builder,
            Body::Bytes(bytes) => builder.body(bytes),
            Body::Stream { stream, .. } => builder
                .header(CONTENT_LENGTH, length)
                .body(reqwest::Body::wrap_stream(stream)),
        };

        let response = builder.send().await.map_err(Self::map_error)?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .bytes_stream()
            .map_err(std::io::Error::other)
            .boxed();

        Ok(Response {
            status,
            headers,
            body: ResponseBody::from_stream(body),
        })
    }
}
