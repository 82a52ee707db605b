//! Mapping object keys onto the local backup tree and back.

use crate::errors::TransferError;
use std::path::{Component, Path, PathBuf};

const MAX_OBJECT_KEY_LEN: usize = 1024;

/// Prefix of in-flight files next to their final destination.
pub const TMP_FILE_PREFIX: &str = ".tmp-";

fn is_safe_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment != "."
        && segment != ".."
        && !segment
            .bytes()
            .any(|b| b.is_ascii_control() || b == b'/' || b == b'\\')
}

/// Bucket names become one directory under the backup root.
pub fn ensure_bucket_name_safe(name: &str) -> Result<(), TransferError> {
    if is_safe_segment(name) {
        Ok(())
    } else {
        Err(TransferError::UnsafeBucketName(name.to_string()))
    }
}

/// Reject keys that would escape `files/` or cannot be represented on disk.
///
/// Rejects empty or overlong keys, a leading `/`, `.`/`..`/empty segments,
/// backslashes, and control characters.
pub fn ensure_key_safe(key: &str) -> Result<(), TransferError> {
    let unsafe_key = || TransferError::UnsafeKey(key.to_string());
    if key.is_empty() || key.len() > MAX_OBJECT_KEY_LEN {
        return Err(unsafe_key());
    }
    if key.split('/').all(is_safe_segment) {
        Ok(())
    } else {
        Err(unsafe_key())
    }
}

/// `files_root/<key segments as nested directories>`. Does not validate.
pub fn key_to_path(files_root: &Path, key: &str) -> PathBuf {
    let mut path = files_root.to_path_buf();
    for segment in key.split('/') {
        path.push(segment);
    }
    path
}

/// Object key for a path relative to `files/`, or `None` for non-UTF-8 names.
pub fn relative_key(relative: &Path) -> Option<String> {
    let mut segments = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => segments.push(part.to_str()?),
            _ => return None,
        }
    }
    if segments.is_empty() {
        None
    } else {
        Some(segments.join("/"))
    }
}
