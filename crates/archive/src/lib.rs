//! Zip archives of directory trees, produced as a stream.
//!
//! Entry names are paths relative to the archived directory with `/`
//! separators. The archive is written front to back (local headers with
//! data descriptors, central directory last), so it can be sent over a
//! socket while it is being built.

mod channel;
mod streamer;

pub use streamer::{ArchiveSummary, archive_dir_to_file, stream_dir_archive, write_dir_archive};

/// Size of the chunks handed to the consumer of [`stream_dir_archive`].
pub const ARCHIVE_CHUNK_SIZE: usize = 64 * 1024;

/// Chunks buffered between the zip producer and the consumer.
pub const ARCHIVE_CHANNEL_DEPTH: usize = 8;

/// Deflate level used for every entry.
pub const COMPRESSION_LEVEL: i64 = 9;

/// Errors produced while building an archive.
#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error(transparent)]
    Scan(#[from] sftt_transfer::TransferError),
}
