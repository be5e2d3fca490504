//! Sequential upload orchestration.
//!
//! Uploads one file, or every file under a directory one after another,
//! reporting each item through a caller-supplied progress sink. A failed
//! item never stops the batch.

use std::path::Path;
use std::time::Duration;

use tracing::{debug, info, warn};

use sftt_protocol::DEFAULT_TIMEOUT;
use sftt_transfer::{
    TransferItem, TransferResult, UploadOutcome, file_checksum, scan_files, validate_key,
};

use crate::error::ClientError;
use crate::uploader::{HttpUploader, Uploader};

// ---------------------------------------------------------------------------
// Progress events
// ---------------------------------------------------------------------------

/// What happened to an item.
#[derive(Debug)]
pub enum ProgressKind {
    Started,
    Succeeded(TransferResult),
    Failed(ClientError),
}

impl ProgressKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Started => "started",
            Self::Succeeded(_) => "succeeded",
            Self::Failed(_) => "failed",
        }
    }
}

/// One progress notification.
///
/// `completed_count` on a `Started` event counts the items finished before
/// it; on `Succeeded` and `Failed` it includes the current item.
#[derive(Debug)]
pub struct ProgressEvent {
    pub kind: ProgressKind,
    pub total_count: usize,
    pub completed_count: usize,
    pub item: TransferItem,
}

/// Running totals built from progress events.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchTally {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl BatchTally {
    pub fn record(&mut self, event: &ProgressEvent) {
        self.total = event.total_count;
        match event.kind {
            ProgressKind::Started => {}
            ProgressKind::Succeeded(_) => self.succeeded += 1,
            ProgressKind::Failed(_) => self.failed += 1,
        }
    }

    /// Items that have not reached a terminal event yet.
    pub fn pending(&self) -> usize {
        self.total.saturating_sub(self.succeeded + self.failed)
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed == 0 && self.pending() == 0
    }
}

// ---------------------------------------------------------------------------
// TransferOrchestrator
// ---------------------------------------------------------------------------

/// Drives uploads through an [`Uploader`].
pub struct TransferOrchestrator<U: Uploader> {
    uploader: U,
    timeout: Option<Duration>,
}

impl<U: Uploader> TransferOrchestrator<U> {
    /// Creates an orchestrator with the default per-upload timeout.
    pub fn new(uploader: U) -> Self {
        Self {
            uploader,
            timeout: Some(DEFAULT_TIMEOUT),
        }
    }

    /// Sets the per-upload timeout. `None` waits indefinitely.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn uploader(&self) -> &U {
        &self.uploader
    }

    /// Uploads a single file under its file name.
    pub async fn put_file(&self, path: &Path) -> Result<TransferResult, ClientError> {
        let item = TransferItem::for_file(path)?;
        self.transfer(&item).await
    }

    /// Uploads every file under `dir`, sequentially.
    ///
    /// Only enumeration errors are returned; per-item failures are reported
    /// to `sink` and the batch continues. Returns the results of the items
    /// that succeeded, in upload order.
    pub async fn put_dir<F>(&self, dir: &Path, sink: F) -> Result<Vec<TransferResult>, ClientError>
    where
        F: FnMut(&ProgressEvent),
    {
        let root = dir.to_path_buf();
        let items = tokio::task::spawn_blocking(move || scan_files(&root))
            .await
            .map_err(std::io::Error::other)??;

        info!(dir = %dir.display(), files = items.len(), "uploading directory");
        Ok(self.put_items(items, sink).await)
    }

    /// Uploads `items` in order, reporting each through `sink`.
    pub async fn put_items<F>(&self, items: Vec<TransferItem>, mut sink: F) -> Vec<TransferResult>
    where
        F: FnMut(&ProgressEvent),
    {
        let total_count = items.len();
        let mut completed_count = 0;
        let mut results = Vec::with_capacity(total_count);

        for item in items {
            sink(&ProgressEvent {
                kind: ProgressKind::Started,
                total_count,
                completed_count,
                item: item.clone(),
            });

            let kind = match self.transfer(&item).await {
                Ok(result) => {
                    results.push(result.clone());
                    ProgressKind::Succeeded(result)
                }
                Err(e) => {
                    warn!(key = %item.key, "upload failed: {e}");
                    ProgressKind::Failed(e)
                }
            };

            completed_count += 1;
            sink(&ProgressEvent {
                kind,
                total_count,
                completed_count,
                item,
            });
        }

        info!(
            total = total_count,
            succeeded = results.len(),
            failed = total_count - results.len(),
            "batch finished"
        );
        results
    }

    /// Validates the key, then hashes and uploads the file. The timeout
    /// covers both hashing and the request.
    async fn transfer(&self, item: &TransferItem) -> Result<TransferResult, ClientError> {
        validate_key(&item.key)?;

        let upload = async {
            let checksum = file_checksum(&item.source_path).await?;
            self.uploader.upload(item, &checksum).await?;
            Ok::<_, ClientError>(checksum)
        };

        let checksum = match self.timeout {
            // Dropping the upload future on expiry closes its connection.
            Some(limit) => tokio::time::timeout(limit, upload)
                .await
                .map_err(|_| ClientError::Timeout(limit))??,
            None => upload.await?,
        };

        debug!(key = %item.key, %checksum, "upload succeeded");
        Ok(TransferResult {
            key: item.key.clone(),
            checksum,
        })
    }
}

impl TransferOrchestrator<HttpUploader> {
    /// Downloads `key` into `dest`. A directory key arrives as a zip.
    pub async fn download(&self, key: &str, dest: &Path) -> Result<UploadOutcome, ClientError> {
        self.uploader.download(key, dest).await
    }
}
