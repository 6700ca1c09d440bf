/*!
 * Virtual hierarchy translation
 *
 * Turns a delimited listing (common prefixes + object keys) into typed
 * entries relative to the listed prefix. Folders come first, then files;
 * each group keeps the store's lexicographic order. Nothing is re-sorted,
 * since a page is only a slice of the full ordering.
 */

use super::entry::Entry;
use crate::protocol::s3::{RawListing, DEFAULT_DELIMITER};

/// Translate a listing of `prefix` using the default `/` delimiter
pub fn translate(listing: &RawListing, prefix: &str) -> Vec<Entry> {
    translate_with(listing, prefix, DEFAULT_DELIMITER)
}

/// Translate a listing of `prefix` folded on `delimiter`
pub fn translate_with(listing: &RawListing, prefix: &str, delimiter: &str) -> Vec<Entry> {
    let mut entries = Vec::with_capacity(listing.key_count());

    for common_prefix in &listing.common_prefixes {
        if common_prefix == prefix {
            continue;
        }
        // An empty segment (`"/"` at the root, `"a//"` under `"a/"`) is still
        // a folder; it shows as a bare delimiter.
        let name = relative_name(common_prefix, prefix);
        let name = name.strip_suffix(delimiter).unwrap_or(name);
        entries.push(Entry::folder(
            format!("{}{}", name, delimiter),
            common_prefix.clone(),
        ));
    }

    for key in &listing.keys {
        // Directory marker object for the prefix itself
        if key == prefix {
            continue;
        }
        let name = relative_name(key, prefix);
        // Anything still nested is already represented by a common prefix
        if name.is_empty() || name.contains(delimiter) {
            continue;
        }
        entries.push(Entry::file(name, key.clone()));
    }

    entries
}

fn relative_name<'a>(full: &'a str, prefix: &str) -> &'a str {
    full.strip_prefix(prefix).unwrap_or(full)
}
