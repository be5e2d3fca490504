//! Upload client for SFTT.
//!
//! [`TransferOrchestrator`] uploads a single file or a whole directory
//! tree, one file at a time, through an [`Uploader`]. Progress is reported
//! per item; a failing item is reported and skipped, never fatal to the
//! batch. [`HttpUploader`] is the HTTP PUT transport.

pub mod error;
pub mod orchestrator;
pub mod uploader;

pub use error::ClientError;
pub use orchestrator::{BatchTally, ProgressEvent, ProgressKind, TransferOrchestrator};
pub use uploader::{HttpUploader, UploadFuture, Uploader};
