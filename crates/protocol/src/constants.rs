use std::time::Duration;

/// Port used when an address string omits one.
pub const DEFAULT_PORT: u16 = 12345;

/// Default per-upload timeout on the client.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

/// Address the upload client targets when none is configured.
pub const DEFAULT_SERVER_ADDRESS: &str = "127.0.0.1:12345/data";

/// Allow-list used by the server when none is configured.
pub const DEFAULT_ALLOWED_IP: &str = "127.0.0.1";

/// Request header carrying the lowercase hex MD5 of a PUT body.
pub const X_CONTENT_MD5: &str = "x-content-md5";

/// Content type for raw file bodies.
pub const CONTENT_TYPE_OCTET_STREAM: &str = "application/octet-stream";

/// Content type for directory archives.
pub const CONTENT_TYPE_ZIP: &str = "application/zip";
