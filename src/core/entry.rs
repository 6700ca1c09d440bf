/*!
 * Browsable entries and locations inside the virtual hierarchy
 */

use serde::{Deserialize, Serialize};
use std::fmt;

/// Key delimiter used to fold flat keys into folders
pub const DELIMITER: char = '/';

/// Display name of the synthetic "go up" entry
pub const PARENT_LINK: &str = "..";

/// Where the browser currently is
///
/// An empty bucket means "at root, listing buckets". A non-empty prefix always
/// ends with [`DELIMITER`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    bucket: String,
    prefix: String,
}

impl Location {
    /// The bucket list
    pub fn root() -> Self {
        Self::default()
    }

    /// Top level of a bucket
    pub fn bucket(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            prefix: String::new(),
        }
    }

    /// A prefix inside a bucket; a missing trailing delimiter is added
    pub fn new(bucket: impl Into<String>, prefix: impl Into<String>) -> Self {
        let bucket = bucket.into();
        let prefix = if bucket.is_empty() {
            String::new()
        } else {
            normalize_prefix(&prefix.into())
        };
        Self { bucket, prefix }
    }

    pub fn bucket_name(&self) -> &str {
        &self.bucket
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn is_root(&self) -> bool {
        self.bucket.is_empty()
    }

    /// Location one level up; `None` at the root
    pub fn parent(&self) -> Option<Location> {
        if self.is_root() {
            None
        } else if self.prefix.is_empty() {
            Some(Location::root())
        } else {
            Some(Location {
                bucket: self.bucket.clone(),
                prefix: parent_prefix(&self.prefix),
            })
        }
    }

    /// Same bucket, a prefix exactly as the store returned it
    pub fn with_prefix(&self, prefix: impl Into<String>) -> Location {
        Location {
            bucket: self.bucket.clone(),
            prefix: prefix.into(),
        }
    }

    /// Key an uploaded file lands under (flat placement)
    pub fn object_key(&self, base_name: &str) -> String {
        format!("{}{}", self.prefix, base_name)
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            write!(f, "s3://")
        } else {
            write!(f, "s3://{}/{}", self.bucket, self.prefix)
        }
    }
}

/// Ensure a non-empty prefix ends with the delimiter
///
/// Leading and doubled delimiters are kept: `"/x/"` and `"a//"` are real
/// prefixes in a flat key space.
pub fn normalize_prefix(prefix: &str) -> String {
    if prefix.is_empty() || prefix.ends_with(DELIMITER) {
        prefix.to_string()
    } else {
        format!("{}{}", prefix, DELIMITER)
    }
}

/// Parent of a prefix: drop the last path segment
///
/// `"a/b/c/"` becomes `"a/b/"`, a single segment becomes `""`.
/// Calling this with `""` also yields `""`; the navigator never does.
pub fn parent_prefix(prefix: &str) -> String {
    let trimmed = prefix.strip_suffix(DELIMITER).unwrap_or(prefix);
    match trimmed.rfind(DELIMITER) {
        Some(pos) => trimmed[..=pos].to_string(),
        None => String::new(),
    }
}

/// Kind tag, mostly for rendering and filtering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Bucket,
    Folder,
    File,
    LoadMore,
}

/// One row of a listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Entry {
    /// Root-level container
    Bucket { name: String },

    /// Virtual folder; `display_name` carries a trailing delimiter
    Folder {
        display_name: String,
        full_prefix: String,
    },

    /// Object; `display_name` is relative to the listed prefix
    File {
        display_name: String,
        full_key: String,
    },

    /// Placeholder that fetches the next page when selected
    LoadMore { remaining_estimate: u64 },
}

impl Entry {
    pub fn bucket(name: impl Into<String>) -> Self {
        Entry::Bucket { name: name.into() }
    }

    pub fn folder(display_name: impl Into<String>, full_prefix: impl Into<String>) -> Self {
        Entry::Folder {
            display_name: display_name.into(),
            full_prefix: full_prefix.into(),
        }
    }

    pub fn file(display_name: impl Into<String>, full_key: impl Into<String>) -> Self {
        Entry::File {
            display_name: display_name.into(),
            full_key: full_key.into(),
        }
    }

    /// The synthetic "go up" entry
    pub fn parent_link() -> Self {
        Entry::folder(PARENT_LINK, "")
    }

    pub fn is_parent_link(&self) -> bool {
        matches!(self, Entry::Folder { display_name, .. } if display_name == PARENT_LINK)
    }

    pub fn is_synthetic(&self) -> bool {
        self.is_parent_link() || matches!(self, Entry::LoadMore { .. })
    }

    pub fn kind(&self) -> EntryKind {
        match self {
            Entry::Bucket { .. } => EntryKind::Bucket,
            Entry::Folder { .. } => EntryKind::Folder,
            Entry::File { .. } => EntryKind::File,
            Entry::LoadMore { .. } => EntryKind::LoadMore,
        }
    }

    pub fn display_name(&self) -> String {
        match self {
            Entry::Bucket { name } => name.clone(),
            Entry::Folder { display_name, .. } | Entry::File { display_name, .. } => {
                display_name.clone()
            }
            Entry::LoadMore { remaining_estimate: 0 } => "... load more".to_string(),
            Entry::LoadMore { remaining_estimate } => {
                format!("... load more ({}+ remaining)", remaining_estimate)
            }
        }
    }
}

/// One page of a listing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageResult {
    pub entries: Vec<Entry>,
    /// Present when more entries exist beyond this page
    pub continuation: Option<String>,
}

impl PageResult {
    pub fn is_truncated(&self) -> bool {
        self.continuation.is_some()
    }

    /// Folder entries only, in listing order
    pub fn folders(&self) -> impl Iterator<Item = &Entry> {
        self.entries
            .iter()
            .filter(|e| e.kind() == EntryKind::Folder)
    }
}
