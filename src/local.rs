/*!
 * Local source selection for uploads
 */

use crate::error::{BrowserError, Result};
use std::collections::BTreeSet;
use std::path::PathBuf;
use walkdir::WalkDir;

/// Expand files and directories into a sorted, deduplicated list of absolute file paths
///
/// Directories are walked recursively; only regular files are kept. The
/// upload key is the bare file name, so nested files land flat.
pub fn collect_sources(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = BTreeSet::new();

    for path in paths {
        if !path.exists() {
            return Err(BrowserError::SourceNotFound(path.clone()));
        }
        let path = path.canonicalize()?;

        if path.is_dir() {
            for entry in WalkDir::new(&path).follow_links(false) {
                let entry = entry.map_err(|e| {
                    BrowserError::Io(
                        e.into_io_error()
                            .unwrap_or_else(|| std::io::Error::other("directory walk failed")),
                    )
                })?;
                if entry.file_type().is_file() {
                    files.insert(entry.into_path());
                }
            }
        } else {
            files.insert(path);
        }
    }

    Ok(files.into_iter().collect())
}

/// Total size of `files` in bytes; unreadable files count as zero
pub fn total_size(files: &[PathBuf]) -> u64 {
    files
        .iter()
        .filter_map(|f| std::fs::metadata(f).ok())
        .map(|m| m.len())
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_walks_directories_and_dedupes() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("photos").join("2024");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(dir.path().join("photos").join("a.jpg"), b"a").unwrap();
        std::fs::write(nested.join("b.jpg"), b"bb").unwrap();

        let photos = dir.path().join("photos");
        let files = collect_sources(&[photos.clone(), photos.join("a.jpg")]).unwrap();

        assert_eq!(files.len(), 2);
        assert!(files.iter().all(|f| f.is_absolute()));
        assert!(files.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(total_size(&files), 3);
    }

    #[test]
    fn test_missing_source() {
        let missing = PathBuf::from("/definitely/not/here.txt");
        assert!(matches!(
            collect_sources(&[missing]),
            Err(BrowserError::SourceNotFound(_))
        ));
    }

    #[test]
    fn test_empty_directory_yields_nothing() {
        let dir = TempDir::new().unwrap();
        assert!(collect_sources(&[dir.path().to_path_buf()])
            .unwrap()
            .is_empty());
    }
}
