//! In-memory object store
//!
//! Behaves like a ListObjectsV2 endpoint over a sorted key map: delimited
//! listings roll nested keys into common prefixes, pages honor `max-keys`
//! (a common prefix counts as one key) and continuation tokens resume after
//! the last returned key or prefix. Failure injection, artificial latency
//! and per-operation call counters make it usable as a test double.
//!
//! ```
//! use s3nav::protocol::s3::{ListRequest, MemoryStore, ObjectStore};
//! use tokio_util::sync::CancellationToken;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let store = MemoryStore::new();
//! store.add_object("assets", "img/a.png", b"png");
//! store.add_object("assets", "img/b/c.png", b"png");
//!
//! let page = store
//!     .list_objects(&ListRequest::new("assets", "img/"), &CancellationToken::new())
//!     .await
//!     .unwrap();
//! assert_eq!(page.entries.len(), 2);
//! # }
//! ```

use super::error::{S3Error, S3Result};
use super::operations::{cancellable, require_bucket, ObjectStore};
use super::types::{ListRequest, RawListing};
use super::MAX_PAGE_SIZE;
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::ops::Bound;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Primitive operations, for call counting and failure injection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    ListBuckets,
    ListObjects,
    PutObject,
}

/// A listing request as the store saw it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedList {
    pub bucket: String,
    pub prefix: String,
    pub continuation_token: Option<String>,
    pub page_size: Option<usize>,
}

#[derive(Debug, Default)]
struct Inner {
    buckets: BTreeMap<String, BTreeMap<String, Bytes>>,
    calls: HashMap<StoreOp, usize>,
    queued_failures: HashMap<StoreOp, VecDeque<S3Error>>,
    failing_keys: HashMap<String, S3Error>,
    listings: Vec<RecordedList>,
    latency: Option<Duration>,
}

/// In-memory S3-compatible store
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Create an empty bucket
    pub fn create_bucket(&self, bucket: impl Into<String>) {
        self.lock().buckets.entry(bucket.into()).or_default();
    }

    /// Store an object, creating the bucket on demand
    pub fn add_object(&self, bucket: impl Into<String>, key: impl Into<String>, data: &[u8]) {
        self.lock()
            .buckets
            .entry(bucket.into())
            .or_default()
            .insert(key.into(), Bytes::copy_from_slice(data));
    }

    /// Object contents, if present
    pub fn get_object(&self, bucket: &str, key: &str) -> Option<Bytes> {
        self.lock().buckets.get(bucket)?.get(key).cloned()
    }

    /// Number of keys in a bucket
    pub fn object_count(&self, bucket: &str) -> usize {
        self.lock().buckets.get(bucket).map_or(0, |b| b.len())
    }

    /// Fail the next call of `op` with `error`; queued failures are consumed in order
    pub fn fail_next(&self, op: StoreOp, error: S3Error) {
        self.lock().queued_failures.entry(op).or_default().push_back(error);
    }

    /// Fail every put to `key` with `error`
    pub fn fail_puts_to(&self, key: impl Into<String>, error: S3Error) {
        self.lock().failing_keys.insert(key.into(), error);
    }

    /// Delay every operation, so tests can cancel mid-flight
    pub fn set_latency(&self, latency: Duration) {
        self.lock().latency = Some(latency);
    }

    /// How many times `op` was invoked, including failed calls
    pub fn calls(&self, op: StoreOp) -> usize {
        self.lock().calls.get(&op).copied().unwrap_or(0)
    }

    /// Every listing request received, in order
    pub fn recorded_listings(&self) -> Vec<RecordedList> {
        self.lock().listings.clone()
    }

    /// Count the call and pop any queued failure
    fn begin(&self, op: StoreOp) -> (Option<S3Error>, Option<Duration>) {
        let mut inner = self.lock();
        *inner.calls.entry(op).or_insert(0) += 1;
        let failure = inner
            .queued_failures
            .get_mut(&op)
            .and_then(|queue| queue.pop_front());
        (failure, inner.latency)
    }

    async fn delay(latency: Option<Duration>, token: &CancellationToken) -> S3Result<()> {
        match latency {
            Some(latency) => {
                cancellable(token, async move {
                    tokio::time::sleep(latency).await;
                    Ok(())
                })
                .await
            }
            None if token.is_cancelled() => Err(S3Error::Cancelled),
            None => Ok(()),
        }
    }

    fn list_locked(inner: &Inner, request: &ListRequest<'_>) -> S3Result<RawListing> {
        let objects = inner.buckets.get(request.bucket).ok_or_else(|| S3Error::Service {
            code: "NoSuchBucket".to_string(),
            message: format!("The specified bucket does not exist: {}", request.bucket),
        })?;

        let max_keys = request.page_size.unwrap_or(MAX_PAGE_SIZE).min(MAX_PAGE_SIZE);
        let delimiter = request.delimiter;
        let lower = match request.continuation_token {
            Some(token) => Bound::Excluded(token.to_string()),
            None => Bound::Unbounded,
        };

        let mut listing = RawListing::default();
        let mut emitted = 0usize;
        let mut last_marker: Option<String> = None;

        for key in objects.range((lower, Bound::Unbounded)).map(|(k, _)| k) {
            if !key.starts_with(request.prefix) {
                continue;
            }
            // Resuming after a common prefix: skip everything rolled into it
            if let Some(token) = request.continuation_token {
                if !delimiter.is_empty() && token.ends_with(delimiter) && key.starts_with(token) {
                    continue;
                }
            }

            let rest = &key[request.prefix.len()..];
            let common_prefix = if delimiter.is_empty() {
                None
            } else {
                rest.find(delimiter).map(|pos| {
                    format!("{}{}", request.prefix, &rest[..pos + delimiter.len()])
                })
            };

            if let Some(cp) = &common_prefix {
                if listing.common_prefixes.last() == Some(cp) {
                    continue;
                }
            }

            if emitted == max_keys {
                listing.next_continuation_token = last_marker.clone();
                break;
            }
            emitted += 1;

            match common_prefix {
                Some(cp) => {
                    last_marker = Some(cp.clone());
                    listing.common_prefixes.push(cp);
                }
                None => {
                    last_marker = Some(key.clone());
                    listing.keys.push(key.clone());
                }
            }
        }

        Ok(listing)
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn list_buckets(&self, token: &CancellationToken) -> S3Result<Vec<String>> {
        let (failure, latency) = self.begin(StoreOp::ListBuckets);
        Self::delay(latency, token).await?;
        if let Some(err) = failure {
            return Err(err);
        }
        Ok(self.lock().buckets.keys().cloned().collect())
    }

    async fn list_page(
        &self,
        request: &ListRequest<'_>,
        token: &CancellationToken,
    ) -> S3Result<RawListing> {
        require_bucket(request.bucket)?;

        let (failure, latency) = self.begin(StoreOp::ListObjects);
        self.lock().listings.push(RecordedList {
            bucket: request.bucket.to_string(),
            prefix: request.prefix.to_string(),
            continuation_token: request.continuation_token.map(|s| s.to_string()),
            page_size: request.page_size,
        });

        Self::delay(latency, token).await?;
        if let Some(err) = failure {
            return Err(err);
        }

        let inner = self.lock();
        Self::list_locked(&inner, request)
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        source: &Path,
        token: &CancellationToken,
    ) -> S3Result<()> {
        require_bucket(bucket)?;

        let (failure, latency) = self.begin(StoreOp::PutObject);
        let data = tokio::fs::read(source)
            .await
            .map_err(|e| S3Error::Io(format!("failed to open {}: {}", source.display(), e)))?;

        Self::delay(latency, token).await?;
        if let Some(err) = failure {
            return Err(err.into_upload());
        }

        let mut inner = self.lock();
        if let Some(err) = inner.failing_keys.get(key) {
            return Err(err.clone().into_upload());
        }
        let objects = inner
            .buckets
            .get_mut(bucket)
            .ok_or_else(|| S3Error::Upload(format!("NoSuchBucket: {}", bucket)))?;
        objects.insert(key.to_string(), Bytes::from(data));
        Ok(())
    }
}
