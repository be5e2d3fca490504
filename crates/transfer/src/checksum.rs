use std::path::Path;

use md5::{Digest, Md5};
use tokio::io::AsyncReadExt;

use crate::{IO_BUFFER_SIZE, TransferError};

// ---------------------------------------------------------------------------
// ContentHasher
// ---------------------------------------------------------------------------

/// Incremental MD5 over a sequence of chunks.
///
/// Chunks must be fed in the order they appear in the content; the digest
/// is order-dependent.
#[derive(Clone, Default)]
pub struct ContentHasher {
    digest: Md5,
    bytes: u64,
}

impl ContentHasher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds the next chunk.
    pub fn update(&mut self, chunk: &[u8]) {
        self.digest.update(chunk);
        self.bytes += chunk.len() as u64;
    }

    /// Number of bytes fed so far.
    pub fn bytes(&self) -> u64 {
        self.bytes
    }

    /// Consumes the hasher and returns the lowercase hex digest.
    pub fn finalize(self) -> String {
        hex::encode(self.digest.finalize())
    }
}

// ---------------------------------------------------------------------------
// Checksum helpers
// ---------------------------------------------------------------------------

/// Computes the MD5 of `data` as lowercase hex.
pub fn checksum_bytes(data: &[u8]) -> String {
    let mut hasher = ContentHasher::new();
    hasher.update(data);
    hasher.finalize()
}

/// Computes the MD5 of a file, reading it in fixed-size buffers.
pub async fn file_checksum(path: &Path) -> Result<String, TransferError> {
    let mut file = tokio::fs::File::open(path).await?;
    let mut hasher = ContentHasher::new();
    let mut buf = vec![0u8; IO_BUFFER_SIZE];
    loop {
        let n = file.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hasher.finalize())
}

/// Compares a declared checksum (e.g. from a request header) with a
/// computed one. Case and surrounding whitespace in `declared` are ignored.
pub fn checksums_match(declared: &str, computed: &str) -> bool {
    declared.trim().eq_ignore_ascii_case(computed)
}
