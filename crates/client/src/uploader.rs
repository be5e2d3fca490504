//! Upload transport.
//!
//! `Uploader` is the seam between the orchestrator and the network, so
//! batch logic can be tested with mocks. `HttpUploader` is the real
//! implementation on top of reqwest.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};
use tokio_util::io::ReaderStream;
use tracing::debug;

use sftt_protocol::{CONTENT_TYPE_OCTET_STREAM, ServerAddress, X_CONTENT_MD5};
use sftt_transfer::{AtomicFileWriter, IO_BUFFER_SIZE, TransferItem, UploadOutcome};

use crate::error::ClientError;

/// A boxed future returned by [`Uploader::upload`].
pub type UploadFuture<'a> = Pin<Box<dyn Future<Output = Result<(), ClientError>> + Send + 'a>>;

/// Sends one file to the server.
///
/// Dropping the returned future must abandon the transfer; the
/// orchestrator relies on that for timeouts.
pub trait Uploader: Send + Sync {
    /// Uploads `item` under its key, declaring `checksum` (lowercase hex MD5).
    fn upload<'a>(&'a self, item: &'a TransferItem, checksum: &'a str) -> UploadFuture<'a>;
}

/// Uploads over HTTP PUT.
///
/// Idle connections are not pooled: each request gets a fresh connection
/// which is closed when the request completes or is dropped.
#[derive(Debug, Clone)]
pub struct HttpUploader {
    client: reqwest::Client,
    address: ServerAddress,
}

impl HttpUploader {
    pub fn new(address: ServerAddress) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder()
            .pool_max_idle_per_host(0)
            .build()?;
        Ok(Self { client, address })
    }

    pub fn address(&self) -> &ServerAddress {
        &self.address
    }

    /// Fetches `key` into `dest`, staging beside it and renaming on success.
    pub async fn download(&self, key: &str, dest: &Path) -> Result<UploadOutcome, ClientError> {
        let url = self.address.url_for(key);
        debug!(%url, "downloading");

        let response = self.client.get(&url).send().await?;
        let response = check_status(response).await?;

        let staging = match dest.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let writer = AtomicFileWriter::new(staging);
        let outcome = writer.write_stream(dest, None, response.bytes_stream()).await?;
        Ok(outcome)
    }

    async fn put(&self, item: &TransferItem, checksum: &str) -> Result<(), ClientError> {
        let url = self.address.url_for(&item.key);
        let file = tokio::fs::File::open(&item.source_path).await?;
        let len = file.metadata().await?.len();
        debug!(%url, key = %item.key, bytes = len, "uploading");

        let body = reqwest::Body::wrap_stream(ReaderStream::with_capacity(file, IO_BUFFER_SIZE));
        let response = self
            .client
            .put(&url)
            .header(X_CONTENT_MD5, checksum)
            .header(CONTENT_TYPE, CONTENT_TYPE_OCTET_STREAM)
            .header(CONTENT_LENGTH, len)
            .body(body)
            .send()
            .await?;

        check_status(response).await?;
        Ok(())
    }
}

impl Uploader for HttpUploader {
    fn upload<'a>(&'a self, item: &'a TransferItem, checksum: &'a str) -> UploadFuture<'a> {
        Box::pin(self.put(item, checksum))
    }
}

/// Anything but 200 is a failure; the body becomes the message.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ClientError> {
    let status = response.status();
    if status == reqwest::StatusCode::OK {
        return Ok(response);
    }
    let message = response.text().await.unwrap_or_default();
    Err(ClientError::Status {
        status: status.as_u16(),
        message,
    })
}
