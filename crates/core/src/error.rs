//! Error types for bz
//!
//! Every fallible operation in the workspace returns [`Error`]. Failures
//! reported by the B2 service itself carry an [`ApiError`], which callers
//! can pull out with [`Error::api_error`].

use serde::Deserialize;
use thiserror::Error;

/// Result type alias using the crate's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// HTTP status that triggers a session refresh
pub const STATUS_UNAUTHORIZED: u16 = 401;

/// Structured error returned by the B2 service
///
/// Decoded from the JSON body of any non-2xx response:
/// `{"status": 401, "code": "expired_auth_token", "message": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Error)]
#[error("B2 API error {status} ({code}): {message}")]
pub struct ApiError {
    /// HTTP status code of the response
    pub status: u16,
    /// Machine-readable error code
    #[serde(default)]
    pub code: String,
    /// Human-readable message
    #[serde(default)]
    pub message: String,
}

impl ApiError {
    pub fn new(status: u16, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            code: code.into(),
            message: message.into(),
        }
    }

    /// Build an ApiError from a raw error body.
    ///
    /// Bodies that are not the service's JSON error shape keep the status and
    /// carry the body text as the message.
    pub fn from_body(status: u16, body: &[u8]) -> Self {
        match serde_json::from_slice::<ApiError>(body) {
            Ok(mut err) => {
                // The transport status wins over whatever the body claims
                err.status = status;
                err
            }
            Err(_) => Self::new(
                status,
                "unknown",
                String::from_utf8_lossy(body).trim().to_string(),
            ),
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status == STATUS_UNAUTHORIZED
    }
}

/// Main error type for bz operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Account not found: {0}")]
    AccountNotFound(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("No file with the given name in the bucket: {0}")]
    FileNotFound(String),

    #[error("Bucket not found: {0}")]
    BucketNotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("{0}")]
    General(String),
}

impl Error {
    /// Returns the service error if this error was reported by the B2 API.
    ///
    /// Network, decoding and local validation errors return `None`.
    pub fn api_error(&self) -> Option<&ApiError> {
        match self {
            Error::Api(e) => Some(e),
            _ => None,
        }
    }

    /// True for a 401 from the service: the only failure retried automatically
    pub fn is_unauthorized(&self) -> bool {
        self.api_error().is_some_and(ApiError::is_unauthorized)
    }

    /// True when the error is a not-found condition, local or remote
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::FileNotFound(_) | Error::BucketNotFound(_) | Error::AccountNotFound(_) => true,
            Error::Api(e) => e.status == 404,
            _ => false,
        }
    }
}
