//! Wire-shaped types returned by the object store

/// One ListObjectsV2 response page, before translation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawListing {
    /// Virtual folders one level below the query prefix
    pub common_prefixes: Vec<String>,

    /// Object keys in store order
    pub keys: Vec<String>,

    /// Token for the next page, if the listing was truncated
    pub next_continuation_token: Option<String>,
}

impl RawListing {
    /// Number of keys plus common prefixes, as S3 reports in `KeyCount`
    pub fn key_count(&self) -> usize {
        self.keys.len() + self.common_prefixes.len()
    }

    pub fn is_truncated(&self) -> bool {
        self.next_continuation_token.is_some()
    }
}

/// Bounded count of the entries directly under a prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CountEstimate {
    /// Keys plus common prefixes on the first page, or the page cap when truncated
    pub count: u64,

    /// The first page did not hold everything; `count` is a floor
    pub truncated: bool,
}

impl CountEstimate {
    /// Whether the prefix may hold more than `threshold` entries
    pub fn exceeds(&self, threshold: u64) -> bool {
        self.truncated || self.count > threshold
    }
}

/// Parameters of a single listing request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListRequest<'a> {
    pub bucket: &'a str,
    pub prefix: &'a str,
    pub delimiter: &'a str,
    pub continuation_token: Option<&'a str>,
    pub page_size: Option<usize>,
}

impl<'a> ListRequest<'a> {
    /// Delimited listing of `prefix` with store defaults
    pub fn new(bucket: &'a str, prefix: &'a str) -> Self {
        Self {
            bucket,
            prefix,
            delimiter: super::DEFAULT_DELIMITER,
            continuation_token: None,
            page_size: None,
        }
    }

    pub fn page_size(mut self, page_size: usize) -> Self {
        self.page_size = Some(page_size);
        self
    }

    pub fn continuation_token(mut self, token: Option<&'a str>) -> Self {
        self.continuation_token = token;
        self
    }
}
