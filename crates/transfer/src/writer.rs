use std::io;
use std::path::{Path, PathBuf};

use futures_util::{Stream, StreamExt};
use tempfile::TempPath;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::checksum::{ContentHasher, checksums_match};
use crate::TransferError;

/// Prefix for staged upload files.
const STAGE_PREFIX: &str = ".sftt-";

/// Result of a successful [`AtomicFileWriter::write_stream`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadOutcome {
    /// Final path the content was published at.
    pub path: PathBuf,
    /// Lowercase hex MD5 of the content.
    pub checksum: String,
    /// Whether a declared checksum was supplied and matched.
    pub verified: bool,
    /// Number of bytes written.
    pub bytes: u64,
}

/// Materializes uploaded files without ever exposing a partial file.
///
/// The body is staged in a uniquely named temp file inside `staging_dir`
/// and renamed onto the target once complete (and verified, when a
/// checksum was declared). Readers of the target see either the old file or
/// the new one.
#[derive(Debug, Clone)]
pub struct AtomicFileWriter {
    staging_dir: PathBuf,
    max_bytes: Option<u64>,
}

impl AtomicFileWriter {
    /// Creates a writer that stages temp files in `staging_dir`.
    pub fn new(staging_dir: impl Into<PathBuf>) -> Self {
        Self {
            staging_dir: staging_dir.into(),
            max_bytes: None,
        }
    }

    /// Limits the accepted body size. `None` means unlimited.
    pub fn with_max_bytes(mut self, max_bytes: Option<u64>) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    pub fn staging_dir(&self) -> &Path {
        &self.staging_dir
    }

    /// Streams `body` to `target`.
    ///
    /// Each chunk is fed to the hasher and then written, in arrival order.
    /// When `expected` is `Some` and non-empty, the computed MD5 must match
    /// it or the staged file is discarded with
    /// [`TransferError::ChecksumMismatch`]. Any error leaves `target`
    /// untouched.
    pub async fn write_stream<S, B, E>(
        &self,
        target: &Path,
        expected: Option<&str>,
        body: S,
    ) -> Result<UploadOutcome, TransferError>
    where
        S: Stream<Item = Result<B, E>>,
        B: AsRef<[u8]>,
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let (std_file, staged) = self.stage().await?;
        let mut file = tokio::fs::File::from_std(std_file);
        let mut hasher = ContentHasher::new();

        let mut body = std::pin::pin!(body);
        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(io::Error::other)?;
            let chunk = chunk.as_ref();

            if let Some(limit) = self.max_bytes {
                if hasher.bytes() + chunk.len() as u64 > limit {
                    warn!(target = %target.display(), limit, "upload exceeds size limit");
                    return Err(TransferError::BodyTooLarge { limit });
                }
            }

            hasher.update(chunk);
            file.write_all(chunk).await?;
        }

        file.flush().await?;
        file.sync_all().await?;
        drop(file);

        let bytes = hasher.bytes();
        let checksum = hasher.finalize();

        let verified = match expected.map(str::trim).filter(|e| !e.is_empty()) {
            Some(declared) if !checksums_match(declared, &checksum) => {
                staged.close()?;
                return Err(TransferError::ChecksumMismatch {
                    expected: declared.to_string(),
                    actual: checksum,
                });
            }
            Some(_) => true,
            None => false,
        };

        publish(staged, target.to_path_buf()).await?;
        debug!(target = %target.display(), bytes, %checksum, verified, "upload published");

        Ok(UploadOutcome {
            path: target.to_path_buf(),
            checksum,
            verified,
            bytes,
        })
    }

    /// Creates the staging temp file. The returned [`TempPath`] deletes the
    /// file when dropped, which is how every error path cleans up.
    async fn stage(&self) -> Result<(std::fs::File, TempPath), TransferError> {
        let dir = self.staging_dir.clone();
        tokio::task::spawn_blocking(move || {
            std::fs::create_dir_all(&dir)?;
            let tmp = tempfile::Builder::new()
                .prefix(STAGE_PREFIX)
                .suffix(".tmp")
                .tempfile_in(&dir)?;
            Ok::<_, TransferError>(tmp.into_parts())
        })
        .await
        .map_err(io::Error::other)?
    }
}

async fn publish(staged: TempPath, target: PathBuf) -> Result<(), TransferError> {
    tokio::task::spawn_blocking(move || persist(staged, &target))
        .await
        .map_err(io::Error::other)?
}

fn persist(staged: TempPath, target: &Path) -> Result<(), TransferError> {
    let err = match staged.persist(target) {
        Ok(()) => return Ok(()),
        Err(err) => err,
    };
    if err.error.kind() != io::ErrorKind::CrossesDevices {
        return Err(err.error.into());
    }

    // Staging dir is on another volume: copy beside the target, then rename.
    let staged = err.path;
    let parent = target.parent().unwrap_or_else(|| Path::new("."));
    debug!(target = %target.display(), "staging dir on another volume, copying beside target");

    let mut sibling = tempfile::Builder::new()
        .prefix(STAGE_PREFIX)
        .suffix(".part")
        .tempfile_in(parent)?;
    let mut src = std::fs::File::open(&staged)?;
    io::copy(&mut src, sibling.as_file_mut())?;
    sibling.as_file().sync_all()?;
    sibling.persist(target).map_err(|e| e.error)?;
    staged.close()?;
    Ok(())
}
