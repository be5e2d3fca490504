//! Server address parsing.
//!
//! The upload client is pointed at a server with a compact string of the
//! form `host[:port][/basePath]`, optionally carrying an auth value either as
//! a URL-style prefix (`auth@host:port/path`) or as a suffix on the path
//! (`host:port/path@auth`).

use std::fmt;

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};

use crate::constants::DEFAULT_PORT;

/// Characters left unescaped in a key, matching `encodeURIComponent`.
const KEY_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Error returned when an address string cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid server address {input:?}: {reason}")]
pub struct AddressError {
    pub input: String,
    pub reason: &'static str,
}

impl AddressError {
    fn new(input: &str, reason: &'static str) -> Self {
        Self {
            input: input.to_string(),
            reason,
        }
    }
}

/// A parsed server endpoint. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerAddress {
    host: String,
    port: u16,
    base_path: String,
    auth: Option<String>,
}

impl ServerAddress {
    /// Parses `host[:port][/basePath]` with an optional auth part.
    ///
    /// The port defaults to [`DEFAULT_PORT`]. `basePath` is normalized to
    /// either `""` or a string starting with `/` and without a trailing `/`.
    pub fn parse(input: &str) -> Result<Self, AddressError> {
        let s = input.trim();

        let (authority, path) = match s.find('/') {
            Some(i) => (&s[..i], &s[i..]),
            None => (s, ""),
        };

        let (mut auth, authority) = match authority.rsplit_once('@') {
            Some((userinfo, rest)) => (Some(userinfo.to_string()), rest),
            None => (None, authority),
        };

        let path = match path.rsplit_once('@') {
            Some((p, suffix)) if auth.is_none() => {
                auth = Some(suffix.to_string());
                p
            }
            _ => path,
        };

        let (host, port) = split_host_port(authority, input)?;
        if host.is_empty() {
            return Err(AddressError::new(input, "host is empty"));
        }

        Ok(Self {
            host: host.to_string(),
            port,
            base_path: normalize_base_path(path),
            auth: auth.filter(|a| !a.is_empty()),
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    pub fn auth(&self) -> Option<&str> {
        self.auth.as_deref()
    }

    /// Request path for `key`: `{basePath}/{percent-encoded key}`.
    pub fn request_path(&self, key: &str) -> String {
        format!("{}/{}", self.base_path, encode_key(key))
    }

    /// Absolute `http://` URL for `key`.
    pub fn url_for(&self, key: &str) -> String {
        format!("http://{}{}", self.authority(), self.request_path(key))
    }

    /// `host:port`, with IPv6 hosts bracketed.
    pub fn authority(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

impl fmt::Display for ServerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.authority(), self.base_path)
    }
}

impl std::str::FromStr for ServerAddress {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Percent-encodes a key the way `encodeURIComponent` does, so `/` inside
/// a key travels as `%2F` and is decoded by the server.
pub fn encode_key(key: &str) -> String {
    utf8_percent_encode(key, KEY_ENCODE_SET).to_string()
}

fn split_host_port<'a>(authority: &'a str, input: &str) -> Result<(&'a str, u16), AddressError> {
    if let Some(rest) = authority.strip_prefix('[') {
        let (host, after) = rest
            .split_once(']')
            .ok_or_else(|| AddressError::new(input, "unterminated IPv6 host"))?;
        return match after {
            "" => Ok((host, DEFAULT_PORT)),
            _ => match after.strip_prefix(':') {
                Some(port) => Ok((host, parse_port(port, input)?)),
                None => Err(AddressError::new(input, "unexpected text after IPv6 host")),
            },
        };
    }

    match authority.matches(':').count() {
        0 => Ok((authority, DEFAULT_PORT)),
        1 => {
            let (host, port) = authority.split_once(':').unwrap_or((authority, ""));
            Ok((host, parse_port(port, input)?))
        }
        // Bare IPv6 literal without brackets: no port possible.
        _ => Ok((authority, DEFAULT_PORT)),
    }
}

fn parse_port(port: &str, input: &str) -> Result<u16, AddressError> {
    if port.is_empty() {
        return Ok(DEFAULT_PORT);
    }
    match port.parse::<u16>() {
        Ok(0) | Err(_) => Err(AddressError::new(input, "port must be 1-65535")),
        Ok(p) => Ok(p),
    }
}

fn normalize_base_path(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}
