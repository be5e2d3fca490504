//! Client error types.

use std::time::Duration;

/// Errors produced while uploading or downloading.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Transfer(#[from] sftt_transfer::TransferError),

    #[error(transparent)]
    Address(#[from] sftt_protocol::AddressError),

    #[error("upload timed out after {0:?}")]
    Timeout(Duration),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server returned {status}: {message}")]
    Status { status: u16, message: String },
}
