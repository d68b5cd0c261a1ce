//! Content hashing before upload
//!
//! B2 requires the SHA-1 of a file in a header sent before the body, and an
//! upload may have to be sent more than once. [`PreparedBody`] obtains the
//! hash and a replayable body as cheaply as the source allows:
//!
//! - [`UploadSource::Buffer`]: hashed in place, replayed from the same bytes
//! - [`UploadSource::Seekable`]: read once to hash, then rewound and re-read
//!   for every attempt
//! - [`UploadSource::Reader`]: read fully into memory once
//!
//! The length recorded here is exactly what the request body will yield.

use std::io::SeekFrom;
use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use bytes::Bytes;
use bz_core::{Body, ByteStream, Error, Result};
use futures::StreamExt;
use futures::stream;
use sha1::{Digest, Sha1};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeek, AsyncSeekExt, ReadBuf};
use tokio::sync::{Mutex, OwnedMutexGuard};

const CHUNK_SIZE: usize = 64 * 1024;

/// A reader that can be rewound
pub trait SeekableSource: AsyncRead + AsyncSeek + Send + Unpin {}

impl<T> SeekableSource for T where T: AsyncRead + AsyncSeek + Send + Unpin {}

/// The contents of an upload, consumed by [`PreparedBody::prepare`]
pub enum UploadSource {
    /// Bytes already in memory
    Buffer(Bytes),
    /// A rewindable reader, read from its current position to the end
    Seekable(Box<dyn SeekableSource>),
    /// Any other reader
    Reader(Box<dyn AsyncRead + Send + Unpin>),
}

impl UploadSource {
    pub fn seekable<S: SeekableSource + 'static>(source: S) -> Self {
        Self::Seekable(Box::new(source))
    }

    pub fn reader<R: AsyncRead + Send + Unpin + 'static>(reader: R) -> Self {
        Self::Reader(Box::new(reader))
    }

    /// Take the contents of `buf`, leaving it empty
    pub fn drain(buf: &mut Vec<u8>) -> Self {
        Self::Buffer(Bytes::from(std::mem::take(buf)))
    }

    /// Open a local file as a seekable source
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = tokio::fs::File::open(path.as_ref()).await?;
        Ok(Self::seekable(file))
    }
}

impl From<Vec<u8>> for UploadSource {
    fn from(v: Vec<u8>) -> Self {
        Self::Buffer(Bytes::from(v))
    }
}

impl From<Bytes> for UploadSource {
    fn from(b: Bytes) -> Self {
        Self::Buffer(b)
    }
}

impl From<String> for UploadSource {
    fn from(s: String) -> Self {
        Self::Buffer(Bytes::from(s))
    }
}

impl From<&'static str> for UploadSource {
    fn from(s: &'static str) -> Self {
        Self::Buffer(Bytes::from_static(s.as_bytes()))
    }
}

impl std::fmt::Debug for UploadSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UploadSource::Buffer(b) => write!(f, "UploadSource::Buffer({} bytes)", b.len()),
            UploadSource::Seekable(_) => f.write_str("UploadSource::Seekable"),
            UploadSource::Reader(_) => f.write_str("UploadSource::Reader"),
        }
    }
}

#[derive(Clone)]
enum Payload {
    Memory(Bytes),
    Seekable {
        source: Arc<Mutex<Box<dyn SeekableSource>>>,
        start: u64,
    },
}

/// Hashed upload contents that can be sent any number of times
#[derive(Clone)]
pub struct PreparedBody {
    sha1: String,
    length: u64,
    payload: Payload,
}

impl PreparedBody {
    /// Hash `source` and make it replayable
    pub async fn prepare(source: UploadSource) -> Result<Self> {
        Self::build(source, None).await
    }

    /// Make `source` replayable, trusting a hash the caller already has
    pub async fn with_known_sha1(source: UploadSource, sha1: impl Into<String>) -> Result<Self> {
        let sha1 = sha1.into();
        validate_sha1(&sha1)?;
        Self::build(source, Some(sha1)).await
    }

    async fn build(source: UploadSource, known_sha1: Option<String>) -> Result<Self> {
        match source {
            UploadSource::Buffer(bytes) => Ok(Self::in_memory(bytes, known_sha1)),
            UploadSource::Reader(mut reader) => {
                tracing::debug!("Upload source is not seekable, buffering it in memory");
                let mut buf = Vec::new();
                reader.read_to_end(&mut buf).await?;
                Ok(Self::in_memory(Bytes::from(buf), known_sha1))
            }
            UploadSource::Seekable(mut source) => {
                let start = source.stream_position().await?;
                let (sha1, length) = match known_sha1 {
                    Some(sha1) => {
                        let end = source.seek(SeekFrom::End(0)).await?;
                        (sha1, end.saturating_sub(start))
                    }
                    None => hash_reader(&mut source).await?,
                };
                source.seek(SeekFrom::Start(start)).await?;

                Ok(Self {
                    sha1,
                    length,
                    payload: Payload::Seekable {
                        source: Arc::new(Mutex::new(source)),
                        start,
                    },
                })
            }
        }
    }

    fn in_memory(bytes: Bytes, known_sha1: Option<String>) -> Self {
        let sha1 = known_sha1.unwrap_or_else(|| sha1_hex(&bytes));
        Self {
            sha1,
            length: bytes.len() as u64,
            payload: Payload::Memory(bytes),
        }
    }

    /// Hex encoded SHA-1 of the contents
    pub fn sha1(&self) -> &str {
        &self.sha1
    }

    /// Exact number of bytes every request body will carry
    pub fn len(&self) -> u64 {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// True when the contents live in memory rather than behind a reader
    pub fn is_in_memory(&self) -> bool {
        matches!(self.payload, Payload::Memory(_))
    }

    /// Rewind to the start and produce a body for one attempt.
    ///
    /// For seekable sources the returned body holds the source until it is
    /// dropped, so attempts never interleave reads. The next call waits
    /// for that drop: a transport that keeps the body alive after sending
    /// it stalls every later attempt on the same `PreparedBody`.
    pub async fn request_body(&self) -> Result<Body> {
        match &self.payload {
            Payload::Memory(bytes) => Ok(Body::Bytes(bytes.clone())),
            Payload::Seekable { source, start } => {
                let mut guard = source.clone().lock_owned().await;
                guard.seek(SeekFrom::Start(*start)).await?;
                Ok(Body::Stream {
                    length: self.length,
                    stream: exact_length_stream(GuardedSource(guard), self.length),
                })
            }
        }
    }
}

impl std::fmt::Debug for PreparedBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreparedBody")
            .field("sha1", &self.sha1)
            .field("length", &self.length)
            .field("in_memory", &self.is_in_memory())
            .finish()
    }
}

/// Hex encoded SHA-1 of `data`
pub fn sha1_hex(data: &[u8]) -> String {
    hex::encode(Sha1::digest(data))
}

fn validate_sha1(sha1: &str) -> Result<()> {
    if sha1.len() != 40 || !sha1.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(Error::InvalidArgument(format!(
            "'{sha1}' is not a hex encoded SHA-1"
        )));
    }
    Ok(())
}

async fn hash_reader<R>(reader: &mut R) -> std::io::Result<(String, u64)>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut hasher = Sha1::new();
    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut length = 0u64;

    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        length += n as u64;
    }

    Ok((hex::encode(hasher.finalize()), length))
}

/// Stream exactly `length` bytes from `reader`.
///
/// A reader that ends early fails the stream instead of sending a short
/// body; bytes past `length` are never read.
pub(crate) fn exact_length_stream<R>(reader: R, length: u64) -> ByteStream
where
    R: AsyncRead + Send + Unpin + 'static,
{
    stream::try_unfold((reader, length), |(mut reader, remaining)| async move {
        if remaining == 0 {
            return Ok(None);
        }

        let want = remaining.min(CHUNK_SIZE as u64) as usize;
        let mut buf = vec![0u8; want];
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            return Err(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                format!("upload source ended {remaining} bytes early"),
            ));
        }
        buf.truncate(n);

        Ok(Some((Bytes::from(buf), (reader, remaining - n as u64))))
    })
    .boxed()
}

struct GuardedSource(OwnedMutexGuard<Box<dyn SeekableSource>>);

impl AsyncRead for GuardedSource {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        Pin::new(&mut *self.0).poll_read(cx, buf)
    }
}
