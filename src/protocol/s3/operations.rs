//! Object store operations trait
//!
//! Implementations supply the three wire primitives; listing translation and
//! count estimation are provided on top of them so every store shares the
//! same hierarchy rules.

use super::error::{S3Error, S3Result};
use super::types::{CountEstimate, ListRequest, RawListing};
use super::{ESTIMATE_PAGE_CAP, MAX_PAGE_SIZE};
use crate::core::entry::PageResult;
use crate::core::hierarchy;
use async_trait::async_trait;
use std::future::Future;
use std::path::Path;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Operations the browser needs from an object store
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Names of all buckets visible to the configured credentials
    async fn list_buckets(&self, token: &CancellationToken) -> S3Result<Vec<String>>;

    /// Fetch one raw ListObjectsV2 page
    async fn list_page(
        &self,
        request: &ListRequest<'_>,
        token: &CancellationToken,
    ) -> S3Result<RawListing>;

    /// Stream a local file to `bucket/key`
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        source: &Path,
        token: &CancellationToken,
    ) -> S3Result<()>;

    /// List one level of the hierarchy under `request.prefix`
    async fn list_objects(
        &self,
        request: &ListRequest<'_>,
        token: &CancellationToken,
    ) -> S3Result<PageResult> {
        require_bucket(request.bucket)?;

        let mut request = request.clone();
        request.page_size = request.page_size.map(clamp_page_size);

        let listing = self.list_page(&request, token).await?;
        debug!(
            bucket = request.bucket,
            prefix = request.prefix,
            key_count = listing.key_count(),
            truncated = listing.is_truncated(),
            "listed page"
        );

        Ok(PageResult {
            entries: hierarchy::translate_with(&listing, request.prefix, request.delimiter),
            continuation: listing.next_continuation_token,
        })
    }

    /// Bounded estimate of how many entries live directly under `prefix`
    ///
    /// Reads a single page of [`ESTIMATE_PAGE_CAP`] keys. A truncated page
    /// yields the cap itself, so the result is "at least N", never exact.
    async fn estimate_count(
        &self,
        bucket: &str,
        prefix: &str,
        token: &CancellationToken,
    ) -> S3Result<u64> {
        self.estimate(bucket, prefix, token).await.map(|e| e.count)
    }

    /// Like [`estimate_count`](Self::estimate_count), also reporting truncation
    async fn estimate(
        &self,
        bucket: &str,
        prefix: &str,
        token: &CancellationToken,
    ) -> S3Result<CountEstimate> {
        require_bucket(bucket)?;

        let request = ListRequest::new(bucket, prefix).page_size(ESTIMATE_PAGE_CAP);
        let listing = self.list_page(&request, token).await?;

        let truncated = listing.is_truncated();
        let count = if truncated {
            ESTIMATE_PAGE_CAP as u64
        } else {
            listing.key_count() as u64
        };
        debug!(bucket, prefix, count, truncated, "estimated object count");
        Ok(CountEstimate { count, truncated })
    }
}

/// Reject an empty bucket before any network call
pub(crate) fn require_bucket(bucket: &str) -> S3Result<()> {
    if bucket.is_empty() {
        return Err(S3Error::invalid_argument("bucket name cannot be empty"));
    }
    Ok(())
}

fn clamp_page_size(size: usize) -> usize {
    size.clamp(1, MAX_PAGE_SIZE)
}

/// Run `fut` until it finishes or `token` is cancelled
pub(crate) async fn cancellable<F, T>(token: &CancellationToken, fut: F) -> S3Result<T>
where
    F: Future<Output = S3Result<T>>,
{
    tokio::select! {
        biased;
        _ = token.cancelled() => Err(S3Error::Cancelled),
        result = fut => result,
    }
}
