//! Object store client for S3-compatible services
//!
//! Four primitives back the browser: list buckets, list one level of a
//! prefix (delimited, paginated), estimate how many entries a prefix holds,
//! and put a local file under a key. Everything runs against a single
//! endpoint configured up front; bucket and prefix are per-call.
//!
//! # Examples
//!
//! ## Browsing a MinIO server
//!
//! ```no_run
//! use s3nav::protocol::s3::{ListRequest, ObjectStore, S3Client, StoreConfigBuilder};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = StoreConfigBuilder::new()
//!         .endpoint("http://localhost:9000")
//!         .credentials("minioadmin", "minioadmin")
//!         .build()?;
//!
//!     let client = S3Client::new(config).await?;
//!     let token = CancellationToken::new();
//!
//!     for bucket in client.list_buckets(&token).await? {
//!         let page = client
//!             .list_objects(&ListRequest::new(&bucket, "").page_size(100), &token)
//!             .await?;
//!         println!("{}: {} entries", bucket, page.entries.len());
//!     }
//!     Ok(())
//! }
//! ```

mod client;
mod config;
mod error;
pub mod memory;
mod operations;
mod types;


pub use client::S3Client;
pub use config::{StoreConfig, StoreConfigBuilder};
pub use error::{S3Error, S3Result};
pub use memory::{MemoryStore, StoreOp};
pub use operations::ObjectStore;
pub use types::{CountEstimate, ListRequest, RawListing};

/// Delimiter that folds keys into virtual folders
pub const DEFAULT_DELIMITER: &str = "/";

/// Page size used by `estimate_count`; also the value returned when truncated
pub const ESTIMATE_PAGE_CAP: usize = 1000;

/// Largest page S3 will return for a single ListObjectsV2 call
pub const MAX_PAGE_SIZE: usize = 1000;
