//! GET and PUT against a resolved path.

use std::io;

use axum::body::Body;
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use tokio_util::io::ReaderStream;
use tracing::{debug, info};

use sftt_archive::stream_dir_archive;
use sftt_protocol::{CONTENT_TYPE_OCTET_STREAM, CONTENT_TYPE_ZIP, X_CONTENT_MD5};
use sftt_transfer::IO_BUFFER_SIZE;

use crate::RequestError;
use crate::router::ServerState;

/// Streams the file or a zip of the directory at `request_path`.
pub(crate) async fn get_entry(
    state: &ServerState,
    request_path: &str,
) -> Result<Response, RequestError> {
    let resolved = state.resolver.resolve(request_path);
    if !resolved.is_allowed {
        return Err(RequestError::OutsideRoot);
    }
    let path = resolved.absolute_path;

    let metadata = match tokio::fs::metadata(&path).await {
        Ok(m) => m,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(RequestError::NotFound),
        Err(e) => return Err(e.into()),
    };

    if metadata.is_file() {
        let file = tokio::fs::File::open(&path).await?;
        debug!(path = %path.display(), bytes = metadata.len(), "streaming file");

        let body = Body::from_stream(ReaderStream::with_capacity(file, IO_BUFFER_SIZE));
        Ok((
            [
                (
                    header::CONTENT_TYPE,
                    HeaderValue::from_static(CONTENT_TYPE_OCTET_STREAM),
                ),
                (header::CONTENT_LENGTH, HeaderValue::from(metadata.len())),
            ],
            body,
        )
            .into_response())
    } else if metadata.is_dir() {
        debug!(path = %path.display(), "streaming directory archive");

        let body = Body::from_stream(stream_dir_archive(path));
        Ok((
            [(header::CONTENT_TYPE, HeaderValue::from_static(CONTENT_TYPE_ZIP))],
            body,
        )
            .into_response())
    } else {
        Err(RequestError::UnsupportedEntry)
    }
}

/// Stores the request body at `request_path`.
///
/// The `x-content-md5` header, when present, must match the body or
/// nothing is written. The computed checksum is echoed back in the same
/// header.
pub(crate) async fn put_entry(
    state: &ServerState,
    request_path: &str,
    headers: &HeaderMap,
    body: Body,
) -> Result<Response, RequestError> {
    let resolved = state.resolver.resolve(request_path);
    if !resolved.is_allowed {
        return Err(RequestError::OutsideRoot);
    }

    let declared = headers
        .get(X_CONTENT_MD5)
        .and_then(|v| v.to_str().ok());

    let outcome = state
        .writer
        .write_stream(&resolved.absolute_path, declared, body.into_data_stream())
        .await?;

    info!(
        path = %outcome.path.display(),
        bytes = outcome.bytes,
        verified = outcome.verified,
        "upload stored"
    );

    let mut response = StatusCode::OK.into_response();
    if let Ok(value) = HeaderValue::from_str(&outcome.checksum) {
        response.headers_mut().insert(X_CONTENT_MD5, value);
    }
    Ok(response)
}
