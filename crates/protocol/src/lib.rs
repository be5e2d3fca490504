//! Shared protocol pieces for SFTT: header names, defaults and the server
//! address format consumed by the upload client.

pub mod address;
pub mod constants;

pub use address::{AddressError, ServerAddress, encode_key};
pub use constants::{
    CONTENT_TYPE_OCTET_STREAM, CONTENT_TYPE_ZIP, DEFAULT_ALLOWED_IP, DEFAULT_PORT,
    DEFAULT_SERVER_ADDRESS, DEFAULT_TIMEOUT, X_CONTENT_MD5,
};
