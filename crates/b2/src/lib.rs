//! bz-b2: Backblaze B2 native API adapter
//!
//! This crate implements the B2 client on top of the `Transport` trait from
//! bz-core:
//! - Session authorization and token refresh
//! - Uploads with a reusable pool of upload URLs
//! - Ranged downloads by file ID or name
//! - Paginated file and version listings
//! - Bucket management
//!
//! Only HTTP 401 is retried automatically. Every other failure, including
//! 429 and 503, is returned to the caller.

pub mod bucket;
pub mod checksum;
pub mod client;
pub mod download;
mod file;
pub mod listing;
pub mod pool;
pub mod session;
pub mod transport;
pub mod upload;

pub use bucket::Bucket;
pub use checksum::{PreparedBody, SeekableSource, UploadSource, sha1_hex};
pub use client::{Client, ClientOptions};
pub use download::{Download, DownloadOptions};
pub use listing::{ListOptions, Listing, ListingState};
pub use pool::UploadUrlPool;
pub use session::{Credentials, Session};
pub use transport::{ReqwestTransport, TransportOptions};
pub use upload::{AUTO_CONTENT_TYPE, MAX_METADATA_ENTRIES, UploadOptions};

/// Path prefix of every B2 native API call
pub const API_PATH: &str = "/b2api/v2/";
