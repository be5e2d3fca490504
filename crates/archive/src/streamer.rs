use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use bytes::Bytes;
use futures_util::Stream;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use zip::CompressionMethod;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use sftt_transfer::scan_files;

use crate::channel::ChannelWriter;
use crate::{ARCHIVE_CHANNEL_DEPTH, ARCHIVE_CHUNK_SIZE, ArchiveError, COMPRESSION_LEVEL};

/// Entries at or above this size need zip64 headers.
const ZIP64_THRESHOLD: u64 = u32::MAX as u64;

/// What ended up in an archive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArchiveSummary {
    /// Entries written completely.
    pub entries: usize,
    /// Files skipped or truncated because they could not be read.
    pub skipped: usize,
    /// Uncompressed bytes written into entries.
    pub bytes: u64,
}

/// Writes a zip of every regular file under `dir` into `out`.
///
/// `out` only needs `Write`: the archive is produced in streaming mode.
/// A file that cannot be opened is skipped and a read error cuts its entry
/// short; both are logged and counted in [`ArchiveSummary::skipped`]. Any
/// failure writing to `out` aborts the archive.
pub fn write_dir_archive<W: Write>(dir: &Path, out: W) -> Result<ArchiveSummary, ArchiveError> {
    let items = scan_files(dir)?;
    let mut zip = ZipWriter::new_stream(out);
    let mut summary = ArchiveSummary::default();
    let mut buf = vec![0u8; ARCHIVE_CHUNK_SIZE];

    for item in items {
        let mut file = match std::fs::File::open(&item.source_path) {
            Ok(f) => f,
            Err(e) => {
                warn!(entry = %item.key, "skipping unreadable file: {e}");
                summary.skipped += 1;
                continue;
            }
        };
        let size = file.metadata().map(|m| m.len()).unwrap_or(0);
        zip.start_file(item.key.as_str(), entry_options(size))?;

        let mut complete = true;
        loop {
            let n = match file.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    warn!(entry = %item.key, "read failed, entry truncated: {e}");
                    complete = false;
                    break;
                }
            };
            zip.write_all(&buf[..n])?;
            summary.bytes += n as u64;
        }

        if complete {
            summary.entries += 1;
        } else {
            summary.skipped += 1;
        }
        debug!(entry = %item.key, "archive entry written");
    }

    let mut out = zip.finish()?;
    out.flush()?;
    Ok(summary)
}

fn entry_options(size: u64) -> SimpleFileOptions {
    SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .compression_level(Some(COMPRESSION_LEVEL))
        .large_file(size >= ZIP64_THRESHOLD)
}

/// Streams a zip of `dir` as a sequence of byte chunks.
///
/// The archive is built on the blocking pool and handed over through a
/// bounded channel, so at most a few chunks are buffered. Dropping the
/// stream stops the producer at its next write. If building fails midway,
/// the stream ends with an error so the consumer can abort the transfer
/// instead of delivering a truncated archive.
pub fn stream_dir_archive(dir: PathBuf) -> impl Stream<Item = io::Result<Bytes>> + Send + 'static {
    let (tx, rx) = mpsc::channel::<io::Result<Bytes>>(ARCHIVE_CHANNEL_DEPTH);

    tokio::task::spawn_blocking(move || {
        let writer = ChannelWriter::new(tx.clone());
        match write_dir_archive(&dir, writer) {
            Ok(summary) => info!(
                dir = %dir.display(),
                entries = summary.entries,
                skipped = summary.skipped,
                bytes = summary.bytes,
                "archive streamed"
            ),
            Err(e) => {
                warn!(dir = %dir.display(), "archive aborted: {e}");
                let _ = tx.blocking_send(Err(io::Error::other(e)));
            }
        }
    });

    futures_util::stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|chunk| (chunk, rx))
    })
}

/// Creates a zip of `dir` at `dest`.
///
/// The archive is built in a temp file beside `dest` and renamed into
/// place, so `dest` never holds a partial archive.
pub async fn archive_dir_to_file(dir: &Path, dest: &Path) -> Result<ArchiveSummary, ArchiveError> {
    let dir = dir.to_path_buf();
    let dest = dest.to_path_buf();

    tokio::task::spawn_blocking(move || {
        let parent = match dest.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&parent)?;

        let mut tmp = tempfile::Builder::new()
            .prefix(".sftt-")
            .suffix(".zip.part")
            .tempfile_in(&parent)?;
        let summary = write_dir_archive(&dir, io::BufWriter::new(tmp.as_file_mut()))?;
        tmp.as_file().sync_all()?;
        tmp.persist(&dest).map_err(|e| e.error)?;

        info!(dest = %dest.display(), entries = summary.entries, "archive written");
        Ok::<_, ArchiveError>(summary)
    })
    .await
    .map_err(io::Error::other)?
}
