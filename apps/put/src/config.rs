//! Upload client configuration.
//!
//! Same layering as the server: defaults, then an optional config file
//! (TOML, or JSON for `.json`), then command-line flags.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

use sftt_protocol::{DEFAULT_SERVER_ADDRESS, DEFAULT_TIMEOUT, ServerAddress};

/// One configuration layer. Unset fields fall through to the layer below.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ConfigLayer {
    /// Single file to upload.
    pub file: Option<PathBuf>,
    /// Directory to upload recursively.
    pub dir: Option<PathBuf>,
    /// `host[:port][/basePath]`.
    pub server: Option<String>,
    /// Per-upload timeout in milliseconds; 0 disables it.
    pub timeout_ms: Option<u64>,
}

impl ConfigLayer {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read config file {}", path.display()))?;

        let layer = if path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
        {
            serde_json::from_str(&content)?
        } else {
            toml::from_str(&content)?
        };
        Ok(layer)
    }

    /// Returns `top` with its unset fields taken from `self`.
    pub fn overlay(self, top: ConfigLayer) -> ConfigLayer {
        ConfigLayer {
            file: top.file.or(self.file),
            dir: top.dir.or(self.dir),
            server: top.server.or(self.server),
            timeout_ms: top.timeout_ms.or(self.timeout_ms),
        }
    }
}

/// What to upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    File(PathBuf),
    Dir(PathBuf),
    Nothing,
}

/// Fully resolved client settings.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub source: Source,
    pub server: ServerAddress,
    pub timeout: Option<Duration>,
}

impl Settings {
    /// Applies defaults and parses the server address.
    ///
    /// A file takes precedence over a directory when both are given. Empty
    /// paths count as unset.
    pub fn resolve(layer: ConfigLayer) -> anyhow::Result<Self> {
        let non_empty = |p: Option<PathBuf>| p.filter(|p| !p.as_os_str().is_empty());

        let source = match (non_empty(layer.file), non_empty(layer.dir)) {
            (Some(file), _) => Source::File(file),
            (None, Some(dir)) => Source::Dir(dir),
            (None, None) => Source::Nothing,
        };

        let server = ServerAddress::parse(
            layer.server.as_deref().unwrap_or(DEFAULT_SERVER_ADDRESS),
        )?;

        let timeout = match layer.timeout_ms {
            Some(0) => None,
            Some(ms) => Some(Duration::from_millis(ms)),
            None => Some(DEFAULT_TIMEOUT),
        };

        Ok(Self {
            source,
            server,
            timeout,
        })
    }
}
