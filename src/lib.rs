/*!
 * s3nav - browse S3-compatible object stores as a folder tree
 *
 * - Delimiter-based listings turned into folders and files
 * - Upward navigation derived from the current prefix
 * - Bounded handling of folders with more entries than a list can show
 * - Sequential batch uploads with per-file outcomes
 */

pub mod cli_style;
pub mod config;
pub mod core;
pub mod error;
pub mod local;
pub mod logging;
pub mod protocol;

// Re-export commonly used types
pub use config::BrowserConfig;
pub use self::core::{Entry, Location, Navigator, Session, SessionHandle, Uploader};
pub use error::{BrowserError, Result};
pub use protocol::s3::{MemoryStore, ObjectStore, S3Client, StoreConfig};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
