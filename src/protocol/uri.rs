/*!
 * Parsing of `s3://bucket/prefix` arguments
 */

use crate::core::entry::Location;
use crate::error::{BrowserError, Result};

/// Parse `s3://bucket/prefix/` into a location
///
/// `s3://` alone is the bucket list. A prefix without a trailing `/` gets one.
/// Leading slashes typed after the bucket are dropped, so `s3://b//img` is
/// `img/` in bucket `b`. Folders reached by browsing keep their exact prefix.
pub fn parse_location(uri: &str) -> Result<Location> {
    let rest = uri.strip_prefix("s3://").ok_or_else(|| {
        BrowserError::InvalidUri(format!("expected s3://bucket/prefix, got {}", uri))
    })?;

    let (bucket, prefix) = match rest.split_once('/') {
        Some((bucket, prefix)) => (bucket, prefix),
        None => (rest, ""),
    };

    if bucket.is_empty() && !prefix.is_empty() {
        return Err(BrowserError::InvalidUri(format!(
            "S3 URI must include bucket name: {}",
            uri
        )));
    }
    if bucket.contains('?') || bucket.contains('@') {
        return Err(BrowserError::InvalidUri(format!(
            "unsupported characters in bucket name: {}",
            bucket
        )));
    }

    Ok(Location::new(bucket, prefix.trim_start_matches('/')))
}
