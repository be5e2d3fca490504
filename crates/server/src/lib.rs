//! HTTP file server for SFTT.
//!
//! Serves one root directory: `GET` streams a file or a zip of a
//! directory, `PUT` stores an upload atomically after verifying its
//! `x-content-md5` header. Every request passes the source address
//! allow-list before anything else happens.

mod access;
mod handlers;
mod resolve;
mod router;
mod server;

use std::net::IpAddr;
use std::path::PathBuf;

use axum::http::StatusCode;

use sftt_transfer::TransferError;

pub use access::{AccessGate, parse_allow_list};
pub use resolve::{PathResolver, ResolvedPath};
pub use server::{FileServer, ServerOptions};

/// Errors that stop the server from starting or running.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("root is not a directory: {}", .0.display())]
    InvalidRoot(PathBuf),
}

/// Per-request failures, each mapped to one response status.
#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    #[error("access denied for {0}")]
    AccessDenied(IpAddr),

    #[error("path escapes the served root")]
    OutsideRoot,

    #[error("not found")]
    NotFound,

    #[error("not a regular file or directory")]
    UnsupportedEntry,

    #[error("checksum mismatch: declared {expected}, computed {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    #[error("method {0} not allowed")]
    MethodNotAllowed(String),

    #[error("body exceeds the {limit} byte limit")]
    BodyTooLarge { limit: u64 },

    #[error("internal error: {0}")]
    Fault(String),
}

impl RequestError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::AccessDenied(_) | Self::OutsideRoot => StatusCode::FORBIDDEN,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::UnsupportedEntry | Self::Fault(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ChecksumMismatch { .. } => StatusCode::BAD_REQUEST,
            Self::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            Self::BodyTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
        }
    }
}

impl From<TransferError> for RequestError {
    fn from(e: TransferError) -> Self {
        match e {
            TransferError::ChecksumMismatch { expected, actual } => {
                Self::ChecksumMismatch { expected, actual }
            }
            TransferError::BodyTooLarge { limit } => Self::BodyTooLarge { limit },
            other => Self::Fault(other.to_string()),
        }
    }
}

impl From<std::io::Error> for RequestError {
    fn from(e: std::io::Error) -> Self {
        Self::Fault(e.to_string())
    }
}
