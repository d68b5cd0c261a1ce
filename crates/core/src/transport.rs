//! Transport abstraction
//!
//! The B2 adapter talks to the network only through [`Transport`], so tests
//! can inject an in-memory service and production code can wrap any HTTP
//! client. A transport performs exactly one request and hands back the raw
//! response; interpreting status codes is left to
//! [`Response::error_for_status`].

use std::pin::Pin;
use std::task::{Context, Poll};

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::stream::{self, BoxStream, Stream, StreamExt, TryStreamExt};
use http::header::{HeaderName, HeaderValue};
use http::{HeaderMap, Method, StatusCode};
use serde::Serialize;

use crate::error::{ApiError, Error, Result};

/// Stream of body chunks
pub type ByteStream = BoxStream<'static, std::io::Result<Bytes>>;

/// Request body with a length known up front
pub enum Body {
    Empty,
    Bytes(Bytes),
    /// A streamed body that must yield exactly `length` bytes
    Stream { length: u64, stream: ByteStream },
}

impl Body {
    /// Serialize `value` as a JSON body
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self> {
        Ok(Body::Bytes(Bytes::from(serde_json::to_vec(value)?)))
    }

    /// Exact number of bytes this body will produce
    pub fn len(&self) -> u64 {
        match self {
            Body::Empty => 0,
            Body::Bytes(b) => b.len() as u64,
            Body::Stream { length, .. } => *length,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Collect the whole body into memory
    pub async fn collect(self) -> Result<Bytes> {
        match self {
            Body::Empty => Ok(Bytes::new()),
            Body::Bytes(b) => Ok(b),
            Body::Stream { stream, .. } => collect_stream(stream).await,
        }
    }
}

impl std::fmt::Debug for Body {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Body::Empty => write!(f, "Body::Empty"),
            Body::Bytes(b) => write!(f, "Body::Bytes({} bytes)", b.len()),
            Body::Stream { length, .. } => write!(f, "Body::Stream({length} bytes)"),
        }
    }
}

/// A single outgoing HTTP request
#[derive(Debug)]
pub struct Request {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Body,
}

impl Request {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HeaderMap::new(),
            body: Body::Empty,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::POST, url)
    }

    /// Set a header, validating both name and value
    pub fn header(mut self, name: &str, value: &str) -> Result<Self> {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| Error::InvalidArgument(format!("header name {name:?}: {e}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| Error::InvalidArgument(format!("header {name} value: {e}")))?;
        self.headers.insert(name, value);
        Ok(self)
    }

    pub fn body(mut self, body: Body) -> Self {
        self.body = body;
        self
    }

    /// Value of a request header as a string, if present and valid UTF-8
    pub fn header_str(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// Body of a response, consumed as a stream of chunks
pub struct ResponseBody {
    inner: ByteStream,
}

impl ResponseBody {
    pub fn from_stream(stream: ByteStream) -> Self {
        Self { inner: stream }
    }

    pub fn from_bytes(bytes: impl Into<Bytes>) -> Self {
        let bytes = bytes.into();
        Self::from_stream(stream::once(async move { Ok::<_, std::io::Error>(bytes) }).boxed())
    }

    pub fn empty() -> Self {
        Self::from_stream(stream::empty().boxed())
    }

    /// Read the remaining body into memory
    pub async fn bytes(self) -> Result<Bytes> {
        collect_stream(self.inner).await
    }

    /// Read and discard the remaining body.
    ///
    /// Errors are ignored: the response is being thrown away anyway.
    pub async fn drain(mut self) {
        while let Some(chunk) = self.inner.next().await {
            if chunk.is_err() {
                break;
            }
        }
    }

    pub fn into_stream(self) -> ByteStream {
        self.inner
    }
}

impl Stream for ResponseBody {
    type Item = std::io::Result<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}

impl std::fmt::Debug for ResponseBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ResponseBody")
    }
}

/// A raw HTTP response
#[derive(Debug)]
pub struct Response {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: ResponseBody,
}

impl Response {
    pub fn new(status: StatusCode, body: ResponseBody) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body,
        }
    }

    /// Value of a response header as a string, if present and valid UTF-8
    pub fn header_str(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Turn a non-2xx response into [`Error::Api`], consuming its body
    pub async fn error_for_status(self) -> Result<Self> {
        if self.status.is_success() {
            return Ok(self);
        }
        let status = self.status.as_u16();
        let body = self.body.bytes().await.unwrap_or_default();
        Err(ApiError::from_body(status, &body).into())
    }

    /// Decode the whole body as JSON
    pub async fn json<T: serde::de::DeserializeOwned>(self) -> Result<T> {
        let body = self.body.bytes().await?;
        serde_json::from_slice(&body)
            .map_err(|e| Error::InvalidResponse(format!("decoding response body: {e}")))
    }
}

/// One-request-at-a-time HTTP client used by the B2 adapter
#[async_trait]
pub trait Transport: Send + Sync {
    /// Perform a single request.
    ///
    /// Returns the response for any status code; only failures to obtain a
    /// response at all (connect, TLS, timeout) are errors.
    async fn send(&self, request: Request) -> Result<Response>;
}

async fn collect_stream(stream: ByteStream) -> Result<Bytes> {
    let buf = stream
        .try_fold(BytesMut::new(), |mut acc, chunk| async move {
            acc.extend_from_slice(&chunk);
            Ok::<_, std::io::Error>(acc)
        })
        .await?;
    Ok(buf.freeze())
}
