//! bz-core: Core library for the bz Backblaze B2 client
//!
//! This crate provides the SDK-independent pieces of bz, including:
//! - The error taxonomy and the service's structured `ApiError`
//! - The file, bucket and session data model
//! - The `Transport` trait the B2 adapter sends every request through
//! - The authorization retry loop
//! - Configuration, account profiles and remote path parsing
//!
//! Keeping the transport behind a trait lets the adapter be tested against
//! an in-memory service without a network.

pub mod account;
pub mod config;
pub mod error;
pub mod path;
pub mod retry;
pub mod transport;
pub mod types;

pub use account::{Account, AccountManager, DEFAULT_AUTH_URL};
pub use config::{Config, ConfigManager, Defaults, MAX_PAGE_SIZE};
pub use error::{ApiError, Error, Result};
pub use path::{RemotePath, parse_path};
pub use retry::{DEFAULT_UPLOAD_ATTEMPTS, is_auth_retryable, retry_on_unauthorized};
pub use transport::{Body, ByteStream, Request, Response, ResponseBody, Transport};
pub use types::{Action, Allowed, BucketInfo, BucketType, FileInfo, SessionInfo, UploadLease};
