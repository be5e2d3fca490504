//! Local file enumeration for uploads.
//!
//! Recursively walks a directory and produces [`TransferItem`]s whose keys
//! are relative paths joined with `/` (even on Windows).

use std::path::{Component, Path};

use crate::types::TransferItem;
use crate::{TransferError, validate_key};

/// Scans `root` recursively and returns one item per regular file.
///
/// Entries are visited in byte order of their names, so the result order
/// is deterministic. Symlinks are not followed. Every regular file is
/// listed; keys are not checked with [`validate_key`] here, so callers that
/// send keys to a server must check them per item.
pub fn scan_files(root: &Path) -> Result<Vec<TransferItem>, TransferError> {
    let root = std::path::absolute(root)?;
    if !std::fs::metadata(&root)?.is_dir() {
        return Err(TransferError::NotADirectory(root));
    }

    let mut items = Vec::new();
    walk_dir(&root, &root, &mut items)?;
    Ok(items)
}

impl TransferItem {
    /// Builds the item for a single file; the key is its file name.
    pub fn for_file(path: &Path) -> Result<Self, TransferError> {
        let source_path = std::path::absolute(path)?;
        if !std::fs::metadata(&source_path)?.is_file() {
            return Err(TransferError::NotAFile(source_path));
        }
        let key = source_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| TransferError::NotAFile(source_path.clone()))?;
        validate_key(&key)?;
        Ok(Self { source_path, key })
    }
}

fn walk_dir(root: &Path, current: &Path, items: &mut Vec<TransferItem>) -> Result<(), TransferError> {
    let mut entries = std::fs::read_dir(current)?.collect::<Result<Vec<_>, _>>()?;
    entries.sort_by_key(|e| e.file_name());

    for entry in entries {
        let path = entry.path();
        let file_type = entry.file_type()?;

        if file_type.is_dir() {
            walk_dir(root, &path, items)?;
        } else if file_type.is_file() {
            let rel = path.strip_prefix(root).map_err(std::io::Error::other)?;
            items.push(TransferItem {
                key: key_from_relative(rel),
                source_path: path,
            });
        }
    }

    Ok(())
}

/// Joins the normal components of a relative path with `/`.
fn key_from_relative(rel: &Path) -> String {
    rel.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}
