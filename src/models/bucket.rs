//! Represents a logical bucket, a top-level container for objects.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A bucket as reported by the remote store.
///
/// Buckets act as namespaces for objects. The backup direction only reads
/// them; restore creates or updates them from [`BucketSettings`].
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Bucket {
    /// Provider identifier. Supabase uses the bucket name here as well.
    pub id: String,

    /// Unique bucket name.
    pub name: String,

    /// Owner reported by the provider, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,

    /// Whether objects are readable without credentials.
    #[serde(default)]
    pub public: bool,

    /// Maximum object size in bytes.
    #[serde(default)]
    pub file_size_limit: Option<u64>,

    /// Content types accepted on upload. `None` accepts everything.
    #[serde(default)]
    pub allowed_mime_types: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// The subset of bucket metadata that restore applies to the remote store.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct BucketSettings {
    pub name: String,
    pub public: bool,
    pub file_size_limit: Option<u64>,
    pub allowed_mime_types: Option<Vec<String>>,
}

impl BucketSettings {
    /// Settings for a private bucket with no limits.
    pub fn private(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            public: false,
            file_size_limit: None,
            allowed_mime_types: None,
        }
    }

    /// Materialize a [`Bucket`] record carrying these settings.
    pub fn to_bucket(&self) -> Bucket {
        Bucket {
            id: self.name.clone(),
            name: self.name.clone(),
            owner: None,
            public: self.public,
            file_size_limit: self.file_size_limit,
            allowed_mime_types: self.allowed_mime_types.clone(),
            created_at: None,
            updated_at: None,
        }
    }
}
