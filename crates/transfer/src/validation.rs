use crate::TransferError;

/// Validates a remote key.
///
/// Rejects:
/// - Empty keys
/// - Keys starting with `/` (absolute)
/// - `..` segments
/// - Backslashes (keys are `/`-separated on every platform)
/// - Windows drive prefixes (`C:`)
pub fn validate_key(key: &str) -> Result<(), TransferError> {
    if key.is_empty() {
        return Err(TransferError::InvalidKey("empty key".into()));
    }

    if key.starts_with('/') {
        return Err(TransferError::InvalidKey(format!(
            "absolute key not allowed: {key}"
        )));
    }

    if key.contains('\\') {
        return Err(TransferError::InvalidKey(format!(
            "backslash not allowed: {key}"
        )));
    }

    if key.len() >= 2 && key.as_bytes()[1] == b':' && key.as_bytes()[0].is_ascii_alphabetic() {
        return Err(TransferError::InvalidKey(format!(
            "drive prefix not allowed: {key}"
        )));
    }

    if key.split('/').any(|segment| segment == "..") {
        return Err(TransferError::InvalidKey(format!(
            "parent directory traversal not allowed: {key}"
        )));
    }

    Ok(())
}
