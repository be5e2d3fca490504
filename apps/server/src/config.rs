//! Server configuration.
//!
//! Settings come from three layers, later ones winning: built-in
//! defaults, an optional config file (TOML, or JSON when the file ends in
//! `.json`), and command-line flags.

use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;

use sftt_protocol::{DEFAULT_ALLOWED_IP, DEFAULT_PORT};
use sftt_server::{ServerOptions, parse_allow_list};

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_DIR: &str = ".";

/// One configuration layer. Unset fields fall through to the layer below.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ConfigLayer {
    /// Comma-separated source addresses allowed to connect.
    pub ip: Option<String>,
    pub port: Option<u16>,
    pub host: Option<String>,
    /// Root directory to serve.
    pub dir: Option<PathBuf>,
    pub staging_dir: Option<PathBuf>,
    pub max_body_bytes: Option<u64>,
}

impl ConfigLayer {
    /// Reads a layer from `path`; the format follows the extension.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read config file {}", path.display()))?;

        let layer = if is_json(path) {
            serde_json::from_str(&content)?
        } else {
            toml::from_str(&content)?
        };
        tracing::debug!(path = %path.display(), "config file loaded");
        Ok(layer)
    }

    /// Returns `top` with its unset fields taken from `self`.
    pub fn overlay(self, top: ConfigLayer) -> ConfigLayer {
        ConfigLayer {
            ip: top.ip.or(self.ip),
            port: top.port.or(self.port),
            host: top.host.or(self.host),
            dir: top.dir.or(self.dir),
            staging_dir: top.staging_dir.or(self.staging_dir),
            max_body_bytes: top.max_body_bytes.or(self.max_body_bytes),
        }
    }
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}

/// Fully resolved server settings.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub allow_list: Vec<String>,
    pub host: String,
    pub port: u16,
    pub dir: PathBuf,
    pub staging_dir: Option<PathBuf>,
    pub max_body_bytes: Option<u64>,
}

impl Settings {
    /// Fills every unset field of `layer` with its default.
    pub fn resolve(layer: ConfigLayer) -> Self {
        let allow_list = parse_allow_list(layer.ip.as_deref().unwrap_or(DEFAULT_ALLOWED_IP));
        let allow_list = if allow_list.is_empty() {
            vec![DEFAULT_ALLOWED_IP.to_string()]
        } else {
            allow_list
        };

        Self {
            allow_list,
            host: layer
                .host
                .map(|h| h.trim().to_string())
                .filter(|h| !h.is_empty())
                .unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: layer.port.unwrap_or(DEFAULT_PORT),
            dir: layer.dir.unwrap_or_else(|| PathBuf::from(DEFAULT_DIR)),
            staging_dir: layer.staging_dir,
            max_body_bytes: layer.max_body_bytes,
        }
    }

    /// Socket address to listen on. The host must be an IP literal.
    pub fn bind_addr(&self) -> anyhow::Result<SocketAddr> {
        let ip: IpAddr = self
            .host
            .parse()
            .with_context(|| format!("listen host must be an IP address: {}", self.host))?;
        Ok(SocketAddr::new(ip, self.port))
    }

    pub fn server_options(&self) -> ServerOptions {
        ServerOptions {
            root: self.dir.clone(),
            allow_list: self.allow_list.clone(),
            staging_dir: self.staging_dir.clone(),
            max_body_bytes: self.max_body_bytes,
        }
    }
}
