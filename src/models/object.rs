//! Listing entries and per-object transfer outcomes.

use serde::{Deserialize, Serialize};

/// One row of a prefix listing.
///
/// The store synthesizes folder-like rows from shared key prefixes; those
/// come back without an `id` and carry no content.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ListEntry {
    /// Name relative to the listed prefix (a single path segment).
    pub name: String,

    /// Object identifier. `None` marks a folder.
    #[serde(default)]
    pub id: Option<String>,

    /// Provider metadata (`size`, `mimetype`, `eTag`, ...). Not trusted for upload.
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

impl ListEntry {
    pub fn file(name: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: Some(id.into()),
            metadata: None,
        }
    }

    pub fn folder(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: None,
            metadata: None,
        }
    }

    pub fn is_folder(&self) -> bool {
        self.id.is_none()
    }
}

/// Result of moving one object in either direction.
#[derive(Debug, Clone, PartialEq)]
pub enum TransferOutcome {
    /// Transfer finished; carries the byte count.
    Transferred(u64),
    /// Transfer failed; carries the rendered cause.
    Failed(String),
}

/// Join a listing prefix and an entry name into a full object key.
pub fn join_key(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", prefix.trim_end_matches('/'), name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_key_at_root_is_bare_name() {
        assert_eq!(join_key("", "cat.jpg"), "cat.jpg");
    }

    #[test]
    fn join_key_nests_under_prefix() {
        assert_eq!(join_key("products", "shoe.png"), "products/shoe.png");
        assert_eq!(join_key("a/b/", "c"), "a/b/c");
    }

    #[test]
    fn folder_entries_deserialize_with_null_id() {
        let entry: ListEntry =
            serde_json::from_str(r#"{"name":"products","id":null,"metadata":null}"#).unwrap();
        assert!(entry.is_folder());

        let entry: ListEntry = serde_json::from_str(
            r#"{"name":"cat.jpg","id":"0b7f","metadata":{"size":12,"mimetype":"image/jpeg"}}"#,
        )
        .unwrap();
        assert!(!entry.is_folder());
    }
}
