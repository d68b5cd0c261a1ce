//! Paginated file listings
//!
//! A [`Listing`] walks `b2_list_file_names` or `b2_list_file_versions` one
//! page at a time, fetching the next page only when the previous one has
//! been fully consumed:
//!
//! ```ignore
//! let mut listing = bucket.list_files("");
//! while listing.advance().await {
//!     let info = listing.file_info().unwrap();
//!     println!("{}", info.name);
//! }
//! if let Some(err) = listing.err() {
//!     return Err(err.into());
//! }
//! ```

use bz_core::{Error, FileInfo, MAX_PAGE_SIZE, Result};
use futures::Stream;
use futures::stream;
use serde::Deserialize;

use crate::bucket::Bucket;
use crate::file::FileWire;

/// Where a listing starts and what it covers
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListOptions {
    /// List every version rather than the latest visible one
    pub versions: bool,
    /// First name to return, inclusive; empty starts at the beginning
    pub start_name: String,
    /// With `versions`, the first version of `start_name` to return
    pub start_id: Option<String>,
    pub prefix: Option<String>,
    /// Collapse names below this delimiter into folder records
    pub delimiter: Option<String>,
    /// Records per request, clamped to 1..=1000
    pub page_size: Option<u32>,
}

impl ListOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn versions(mut self) -> Self {
        self.versions = true;
        self
    }

    pub fn start_name(mut self, name: impl Into<String>) -> Self {
        self.start_name = name.into();
        self
    }

    pub fn start_id(mut self, id: impl Into<String>) -> Self {
        self.start_id = Some(id.into());
        self
    }

    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.delimiter = Some(delimiter.into());
        self
    }

    pub fn page_size(mut self, page_size: u32) -> Self {
        self.page_size = Some(page_size);
        self
    }
}

/// Progress of a [`Listing`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingState {
    /// Buffer empty, a next page is known
    Ready,
    /// A page request is in flight
    Fetching,
    /// Records from the last page are being handed out
    Draining,
    /// Every record has been returned
    Exhausted,
    /// A request failed; see [`Listing::err`]
    Failed,
}

impl ListingState {
    pub fn is_terminal(self) -> bool {
        matches!(self, ListingState::Exhausted | ListingState::Failed)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListPage {
    #[serde(default)]
    files: Vec<FileWire>,
    #[serde(default)]
    next_file_name: Option<String>,
    #[serde(default)]
    next_file_id: Option<String>,
}

/// Cursor over the files of a bucket.
///
/// Records come back ordered by name; in versions mode the versions of one
/// name are newest first.
#[derive(Debug)]
pub struct Listing {
    bucket: Bucket,
    versions: bool,
    prefix: Option<String>,
    delimiter: Option<String>,
    page_size: u32,
    next_name: Option<String>,
    next_id: Option<String>,
    /// Current page in reverse order, consumed with `pop`
    page: Vec<FileInfo>,
    current: Option<FileInfo>,
    state: ListingState,
    error: Option<Error>,
}

impl Listing {
    fn new(bucket: Bucket, options: ListOptions) -> Self {
        let page_size = options
            .page_size
            .unwrap_or(bucket.client().options().page_size);

        let mut listing = Self {
            bucket,
            versions: options.versions,
            prefix: options.prefix,
            delimiter: options.delimiter,
            page_size: page_size.clamp(1, MAX_PAGE_SIZE),
            next_name: Some(options.start_name),
            next_id: options.start_id.filter(|id| !id.is_empty()),
            page: Vec::new(),
            current: None,
            state: ListingState::Ready,
            error: None,
        };

        let start_name_empty = listing.next_name.as_deref().is_none_or(str::is_empty);
        if listing.next_id.is_some() && start_name_empty {
            listing.fail(Error::InvalidArgument(
                "a start file ID requires a start file name".into(),
            ));
        }
        listing
    }

    fn fail(&mut self, error: Error) {
        self.state = ListingState::Failed;
        self.current = None;
        self.page.clear();
        self.error = Some(error);
    }

    /// Move to the next record, fetching a page when the buffer is empty.
    ///
    /// Returns `true` when [`file_info`](Self::file_info) holds a new
    /// record. `false` means the listing ended; [`err`](Self::err) tells a
    /// failure apart from exhaustion.
    pub async fn advance(&mut self) -> bool {
        loop {
            if self.state.is_terminal() {
                self.current = None;
                return false;
            }

            if let Some(info) = self.page.pop() {
                self.current = Some(info);
                self.state = match (self.page.is_empty(), self.next_name.is_some()) {
                    (false, _) => ListingState::Draining,
                    (true, true) => ListingState::Ready,
                    (true, false) => ListingState::Exhausted,
                };
                return true;
            }

            // The cursor is only replaced once a page arrives, so a dropped
            // fetch is simply repeated by the next call
            let Some(start_name) = self.next_name.clone() else {
                self.state = ListingState::Exhausted;
                self.current = None;
                return false;
            };

            self.state = ListingState::Fetching;
            match self.fetch_page(&start_name).await {
                Ok(page) => {
                    let mut files = Vec::with_capacity(page.files.len());
                    for wire in page.files {
                        match wire.into_file_info() {
                            Ok(info) => files.push(info),
                            Err(e) => {
                                self.fail(e);
                                return false;
                            }
                        }
                    }
                    files.reverse();

                    tracing::debug!(
                        bucket = %self.bucket.name(),
                        start_name = %start_name,
                        records = files.len(),
                        more = page.next_file_name.is_some(),
                        "Fetched listing page"
                    );

                    self.page = files;
                    self.next_name = page.next_file_name;
                    self.next_id = page.next_file_id;
                    self.state = ListingState::Draining;
                }
                Err(e) => {
                    tracing::debug!(bucket = %self.bucket.name(), error = %e, "Listing failed");
                    self.fail(e);
                    return false;
                }
            }
        }
    }

    async fn fetch_page(&self, start_name: &str) -> Result<ListPage> {
        let operation = if self.versions {
            "b2_list_file_versions"
        } else {
            "b2_list_file_names"
        };

        let mut payload = serde_json::json!({
            "bucketId": self.bucket.id(),
            "startFileName": start_name,
            "maxFileCount": self.page_size,
        });
        if self.versions
            && let Some(id) = &self.next_id
        {
            payload["startFileId"] = serde_json::Value::String(id.clone());
        }
        if let Some(prefix) = &self.prefix {
            payload["prefix"] = serde_json::Value::String(prefix.clone());
        }
        if let Some(delimiter) = &self.delimiter {
            payload["delimiter"] = serde_json::Value::String(delimiter.clone());
        }

        self.bucket.client().api_request(operation, &payload).await
    }

    /// The record made available by the last successful `advance`
    pub fn file_info(&self) -> Option<&FileInfo> {
        self.current.as_ref()
    }

    /// The error that stopped the listing, if any
    pub fn err(&self) -> Option<&Error> {
        self.error.as_ref()
    }

    pub fn state(&self) -> ListingState {
        self.state
    }

    /// Records requested per page from now on, clamped to 1..=1000.
    ///
    /// This never limits how many records the listing returns overall.
    pub fn set_page_size(&mut self, page_size: u32) {
        self.page_size = page_size.clamp(1, MAX_PAGE_SIZE);
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Consume the listing into memory, stopping at the first error
    pub async fn try_collect(mut self) -> Result<Vec<FileInfo>> {
        let mut files = Vec::new();
        while self.advance().await {
            if let Some(info) = self.current.take() {
                files.push(info);
            }
        }
        match self.error {
            Some(e) => Err(e),
            None => Ok(files),
        }
    }

    /// Turn the listing into a stream that ends with its error, if any
    pub fn into_stream(self) -> impl Stream<Item = Result<FileInfo>> + Send {
        stream::unfold(Some(self), |listing| async move {
            let mut listing = listing?;
            if listing.advance().await {
                let info = listing.current.take()?;
                Some((Ok(info), Some(listing)))
            } else {
                listing.error.take().map(|e| (Err(e), None))
            }
        })
    }
}

impl Bucket {
    /// Latest visible version of every file, starting at `start_name`
    pub fn list_files(&self, start_name: &str) -> Listing {
        self.list(ListOptions::new().start_name(start_name))
    }

    /// Every version of every file, starting at `start_name` and, when
    /// given, at the version `start_id` of it.
    ///
    /// A `start_id` without a `start_name` yields a listing that has
    /// already failed; no request is made.
    pub fn list_file_versions(&self, start_name: &str, start_id: &str) -> Listing {
        let mut options = ListOptions::new().versions().start_name(start_name);
        if !start_id.is_empty() {
            options = options.start_id(start_id);
        }
        self.list(options)
    }

    pub fn list(&self, options: ListOptions) -> Listing {
        Listing::new(self.clone(), options)
    }

    /// Latest version of the file called `name`
    pub async fn get_file_info_by_name(&self, name: &str) -> Result<FileInfo> {
        let mut listing = self.list(ListOptions::new().start_name(name).page_size(1));

        if listing.advance().await
            && let Some(info) = listing.current.take()
            && info.name == name
        {
            return Ok(info);
        }
        match listing.error {
            Some(e) => Err(e),
            None => Err(Error::FileNotFound(name.to_string())),
        }
    }
}
