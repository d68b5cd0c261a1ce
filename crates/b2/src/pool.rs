//! Upload-URL lease pool
//!
//! `b2_get_upload_url` is a control-plane round trip, so upload URLs that
//! worked are kept per bucket and handed to the next upload. The most
//! recently returned lease is reused first. Leases never expire here;
//! a stale one is discovered when an upload with it fails, and is dropped.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use bz_core::UploadLease;

/// Per-bucket LIFO cache of upload leases
#[derive(Debug, Default)]
pub struct UploadUrlPool {
    leases: Mutex<HashMap<String, Vec<UploadLease>>>,
}

impl UploadUrlPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the most recently returned lease for `bucket_id`
    pub fn pop(&self, bucket_id: &str) -> Option<UploadLease> {
        let mut leases = self.lock();
        let stack = leases.get_mut(bucket_id)?;
        let lease = stack.pop();
        if stack.is_empty() {
            leases.remove(bucket_id);
        }
        lease
    }

    /// Return a lease after a successful upload
    pub fn push(&self, lease: UploadLease) {
        self.lock()
            .entry(lease.bucket_id.clone())
            .or_default()
            .push(lease);
    }

    /// Drop every cached lease for `bucket_id`, returning how many were dropped
    pub fn invalidate(&self, bucket_id: &str) -> usize {
        self.lock().remove(bucket_id).map_or(0, |stack| stack.len())
    }

    /// Number of cached leases for `bucket_id`
    pub fn len(&self, bucket_id: &str) -> usize {
        self.lock().get(bucket_id).map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Vec<UploadLease>>> {
        // The map holds no invariants a panicking holder could break
        self.leases.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
