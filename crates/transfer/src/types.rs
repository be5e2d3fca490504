use std::path::PathBuf;

/// A local file scheduled for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferItem {
    /// Absolute path of the local file.
    pub source_path: PathBuf,
    /// Remote identifier: relative and `/`-separated. Uploads check it
    /// with `validate_key` before sending.
    pub key: String,
}

/// Outcome of one successful upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferResult {
    pub key: String,
    /// Lowercase hex MD5 sent in the integrity header.
    pub checksum: String,
}
