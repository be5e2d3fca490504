//! Request path to filesystem path mapping.

use std::path::{Component, Path, PathBuf};

use percent_encoding::percent_decode_str;

/// Outcome of resolving one request path. Computed per request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPath {
    /// Whether `absolute_path` stays inside the served root.
    pub is_allowed: bool,
    /// Normalized absolute path the request refers to.
    pub absolute_path: PathBuf,
}

/// Maps URL paths onto a fixed root directory.
///
/// The root must already be absolute and normalized (the server
/// canonicalizes it at start-up).
#[derive(Debug, Clone)]
pub struct PathResolver {
    root: PathBuf,
}

impl PathResolver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolves a raw (still percent-encoded) request path.
    ///
    /// The path is decoded first and normalized afterwards, so encoded
    /// `..` segments are treated like literal ones. Containment is checked
    /// component-wise on the normalized result: `/srv/rootx` is not inside
    /// `/srv/root`.
    pub fn resolve(&self, request_path: &str) -> ResolvedPath {
        let decoded = percent_decode_str(request_path).decode_utf8_lossy();
        let relative = decoded.strip_prefix('/').unwrap_or(&decoded);

        let absolute_path = normalize(&self.root.join(relative));
        let is_allowed = absolute_path.starts_with(&self.root);

        ResolvedPath {
            is_allowed,
            absolute_path,
        }
    }
}

/// Lexical normalization: drops `.`, applies `..` (never above the
/// filesystem root). Does not touch the filesystem.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => out.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            Component::Normal(part) => out.push(part),
        }
    }
    out
}
