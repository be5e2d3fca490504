//! Transfer primitives shared by the SFTT server and client.
//!
//! - [`ContentHasher`]: streaming MD5 used on both ends of an upload.
//! - [`AtomicFileWriter`]: stages an incoming body in a temp file, verifies
//!   it and publishes it with a single rename.
//! - [`scan_files`]: walks a local tree into [`TransferItem`]s with
//!   `/`-separated keys.

mod checksum;
mod scanner;
mod types;
mod validation;
mod writer;

use std::path::PathBuf;

pub use checksum::{ContentHasher, checksum_bytes, checksums_match, file_checksum};
pub use scanner::scan_files;
pub use types::{TransferItem, TransferResult};
pub use validation::validate_key;
pub use writer::{AtomicFileWriter, UploadOutcome};

/// Read buffer used when hashing or copying local files (64 KiB).
pub const IO_BUFFER_SIZE: usize = 64 * 1024;

/// Errors produced by the transfer crate.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("checksum mismatch: declared {expected}, computed {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    #[error("body exceeds the {limit} byte limit")]
    BodyTooLarge { limit: u64 },

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("not a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    #[error("not a file: {}", .0.display())]
    NotAFile(PathBuf),
}
