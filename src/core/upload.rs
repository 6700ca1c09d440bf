/*!
 * Upload orchestration
 *
 * Puts a batch of local files under one destination, one at a time, in the
 * order given. Keys are flat: `destination.prefix + file name`, whatever
 * directory the file came from. A failed file is recorded and the batch
 * moves on.
 */

use super::entry::Location;
use crate::protocol::s3::{ObjectStore, S3Error, S3Result};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "lowercase")]
pub enum UploadOutcome {
    Success,
    Failure(String),
}

impl UploadOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, UploadOutcome::Success)
    }
}

/// One attempted file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadResult {
    pub path: PathBuf,
    pub key: String,
    pub outcome: UploadOutcome,
}

/// A file that did not make it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedUpload {
    pub path: PathBuf,
    pub reason: String,
}

/// Aggregate result of a batch
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UploadReport {
    pub succeeded: usize,
    pub failed: Vec<FailedUpload>,
}

impl UploadReport {
    pub fn attempted(&self) -> usize {
        self.succeeded + self.failed.len()
    }

    pub fn is_complete_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Emitted after every attempted file; `completed` only grows
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadProgress {
    pub completed: usize,
    pub total: usize,
    pub path: PathBuf,
    pub key: String,
    pub outcome: UploadOutcome,
}

/// A batch of sources bound for one location
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadJob {
    pub sources: Vec<PathBuf>,
    pub destination: Location,
    pub results: Vec<UploadResult>,
}

impl UploadJob {
    /// Validate a batch before anything touches the network
    pub fn new(sources: Vec<PathBuf>, destination: Location) -> S3Result<Self> {
        if sources.is_empty() {
            return Err(S3Error::invalid_argument("no files selected for upload"));
        }
        if destination.is_root() {
            return Err(S3Error::invalid_argument("no destination selected"));
        }
        Ok(Self {
            sources,
            destination,
            results: Vec::new(),
        })
    }

    pub fn is_finished(&self) -> bool {
        self.results.len() == self.sources.len()
    }

    pub fn report(&self) -> UploadReport {
        let mut report = UploadReport::default();
        for result in &self.results {
            match &result.outcome {
                UploadOutcome::Success => report.succeeded += 1,
                UploadOutcome::Failure(reason) => report.failed.push(FailedUpload {
                    path: result.path.clone(),
                    reason: reason.clone(),
                }),
            }
        }
        report
    }
}

/// Key a local file is stored under at `destination`
pub fn object_key_for(destination: &Location, path: &Path) -> S3Result<String> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .filter(|n| !n.is_empty())
        .ok_or_else(|| {
            S3Error::invalid_argument(format!("{} has no usable file name", path.display()))
        })?;
    Ok(destination.object_key(name))
}

/// Drives upload jobs against a store
#[derive(Clone)]
pub struct Uploader {
    store: Arc<dyn ObjectStore>,
}

impl Uploader {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// Upload every source in order and return the finished job
    ///
    /// Fails only for an empty batch or a missing destination; per-file
    /// failures land in the job's results.
    pub async fn upload(
        &self,
        sources: Vec<PathBuf>,
        destination: Location,
        progress: Option<UnboundedSender<UploadProgress>>,
    ) -> S3Result<UploadJob> {
        let mut job = UploadJob::new(sources, destination)?;
        self.run(&mut job, progress).await;
        Ok(job)
    }

    /// Attempt every source of `job` not attempted yet
    pub async fn run(&self, job: &mut UploadJob, progress: Option<UnboundedSender<UploadProgress>>) {
        let total = job.sources.len();
        let start = Instant::now();
        // Uploads are not interruptible once confirmed
        let token = CancellationToken::new();

        info!(destination = %job.destination, total, "upload started");

        for path in job.sources.iter().skip(job.results.len()) {
            let (key, outcome) = match object_key_for(&job.destination, path) {
                Ok(key) => {
                    let outcome = match self
                        .store
                        .put_object(job.destination.bucket_name(), &key, path, &token)
                        .await
                    {
                        Ok(()) => {
                            debug!(path = %path.display(), key = %key, "uploaded");
                            UploadOutcome::Success
                        }
                        Err(e) => {
                            warn!(path = %path.display(), key = %key, error = %e, "upload failed");
                            UploadOutcome::Failure(e.to_string())
                        }
                    };
                    (key, outcome)
                }
                Err(e) => (String::new(), UploadOutcome::Failure(e.to_string())),
            };

            job.results.push(UploadResult {
                path: path.clone(),
                key: key.clone(),
                outcome: outcome.clone(),
            });

            if let Some(tx) = &progress {
                // Receiver may have gone away; the batch still finishes
                let _ = tx.send(UploadProgress {
                    completed: job.results.len(),
                    total,
                    path: path.clone(),
                    key,
                    outcome,
                });
            }
        }

        let report = job.report();
        info!(
            succeeded = report.succeeded,
            failed = report.failed.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "upload finished"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::s3::{MemoryStore, StoreOp};
    use tempfile::TempDir;

    fn write_files(dir: &TempDir, names: &[&str]) -> Vec<PathBuf> {
        names
            .iter()
            .map(|name| {
                let path = dir.path().join(name);
                std::fs::write(&path, name.as_bytes()).unwrap();
                path
            })
            .collect()
    }

    #[test]
    fn test_key_is_flat() {
        let dest = Location::new("b", "docs/");
        assert_eq!(
            object_key_for(&dest, Path::new("/home/u/deep/nested/report.pdf")).unwrap(),
            "docs/report.pdf"
        );
        assert_eq!(
            object_key_for(&Location::bucket("b"), Path::new("a.txt")).unwrap(),
            "a.txt"
        );
        assert!(object_key_for(&dest, Path::new("/")).is_err());
    }

    #[tokio::test]
    async fn test_empty_sources_fail_fast() {
        let store = MemoryStore::new();
        store.create_bucket("b");
        let uploader = Uploader::new(Arc::new(store.clone()));

        let err = uploader
            .upload(vec![], Location::bucket("b"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, S3Error::InvalidArgument(_)));
        assert_eq!(store.calls(StoreOp::PutObject), 0);
    }

    #[tokio::test]
    async fn test_missing_destination_fails_fast() {
        let dir = TempDir::new().unwrap();
        let sources = write_files(&dir, &["a.txt"]);
        let store = MemoryStore::new();
        let uploader = Uploader::new(Arc::new(store.clone()));

        let err = uploader
            .upload(sources, Location::root(), None)
            .await
            .unwrap_err();
        assert_eq!(err, S3Error::InvalidArgument("no destination selected".to_string()));
        assert_eq!(store.calls(StoreOp::PutObject), 0);
    }

    #[tokio::test]
    async fn test_second_file_failure_does_not_stop_batch() {
        let dir = TempDir::new().unwrap();
        let sources = write_files(&dir, &["one.txt", "two.txt", "three.txt", "four.txt"]);
        let store = MemoryStore::new();
        store.create_bucket("b");
        store.fail_puts_to("up/two.txt", S3Error::Connection("reset by peer".to_string()));
        let uploader = Uploader::new(Arc::new(store.clone()));

        let job = uploader
            .upload(sources.clone(), Location::new("b", "up/"), None)
            .await
            .unwrap();
        let report = job.report();

        assert_eq!(report.succeeded, 3);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].path, sources[1]);
        assert!(report.failed[0].reason.contains("reset by peer"));
        assert_eq!(job.results.len(), 4);
        assert_eq!(store.calls(StoreOp::PutObject), 4);
        assert!(store.get_object("b", "up/four.txt").is_some());
        assert!(store.get_object("b", "up/two.txt").is_none());
    }

    #[tokio::test]
    async fn test_unreadable_source_is_recorded() {
        let dir = TempDir::new().unwrap();
        let mut sources = write_files(&dir, &["ok.txt"]);
        sources.insert(0, dir.path().join("gone.txt"));
        let store = MemoryStore::new();
        store.create_bucket("b");
        let uploader = Uploader::new(Arc::new(store.clone()));

        let job = uploader
            .upload(sources, Location::bucket("b"), None)
            .await
            .unwrap();

        assert!(matches!(&job.results[0].outcome, UploadOutcome::Failure(r) if r.contains("I/O")));
        assert!(job.results[1].outcome.is_success());
        assert!(job.is_finished());
    }

    #[tokio::test]
    async fn test_progress_is_monotonic() {
        let dir = TempDir::new().unwrap();
        let sources = write_files(&dir, &["a", "b", "c"]);
        let store = MemoryStore::new();
        store.create_bucket("b");
        let uploader = Uploader::new(Arc::new(store));
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();

        uploader
            .upload(sources, Location::bucket("b"), Some(tx))
            .await
            .unwrap();

        let mut seen = Vec::new();
        while let Some(event) = rx.recv().await {
            assert_eq!(event.total, 3);
            seen.push(event.completed);
        }
        assert_eq!(seen, vec![1, 2, 3]);
    }
}
