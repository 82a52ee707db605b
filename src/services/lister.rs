//! Bucket enumeration and recursive key listing.
//!
//! The store has no directories: a listing under a prefix returns files plus
//! synthesized folder rows (no `id`) for deeper shared prefixes. The lister
//! recurses into those rows and flattens everything into one ordered key list.

use super::store::ObjectStore;
use crate::{
    errors::ListError,
    models::{
        bucket::Bucket,
        object::{ListEntry, join_key},
    },
};
use futures::{FutureExt, future::BoxFuture};
use std::{collections::HashSet, sync::Arc};
use tracing::{debug, warn};

pub const DEFAULT_PAGE_SIZE: usize = 1000;
pub const MAX_PAGE_SIZE: usize = 1000;
pub const DEFAULT_MAX_DEPTH: usize = 64;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ListOptions {
    /// Entries requested per listing call (clamped to 1..=1000).
    pub page_size: usize,
    /// Deepest folder nesting followed before giving up on a bucket.
    pub max_depth: usize,
}

impl Default for ListOptions {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

/// List every bucket, sorted by name.
///
/// A failure here has no per-bucket fallback; callers abort the run.
pub async fn list_buckets(store: &dyn ObjectStore) -> Result<Vec<Bucket>, ListError> {
    let mut buckets = store
        .list_buckets()
        .await
        .map_err(|source| ListError::Buckets { source })?;
    buckets.sort_by(|a, b| a.name.cmp(&b.name));
    debug!("enumerated {} buckets", buckets.len());
    Ok(buckets)
}

#[derive(Clone)]
pub struct ObjectLister {
    store: Arc<dyn ObjectStore>,
    options: ListOptions,
}

impl ObjectLister {
    pub fn new(store: Arc<dyn ObjectStore>, options: ListOptions) -> Self {
        Self { store, options }
    }

    /// Every leaf key under `prefix` (`""` for the whole bucket), depth-first
    /// in listing order, each key at most once.
    pub async fn list_all(&self, bucket: &str, prefix: &str) -> Result<Vec<String>, ListError> {
        let mut keys = Vec::new();
        let mut seen = HashSet::new();
        self.walk(
            bucket,
            prefix.trim_matches('/').to_string(),
            0,
            &mut keys,
            &mut seen,
        )
        .await?;
        Ok(keys)
    }

    fn walk<'a>(
        &'a self,
        bucket: &'a str,
        prefix: String,
        depth: usize,
        keys: &'a mut Vec<String>,
        seen: &'a mut HashSet<String>,
    ) -> BoxFuture<'a, Result<(), ListError>> {
        async move {
            if depth > self.options.max_depth {
                return Err(ListError::DepthExceeded {
                    bucket: bucket.to_string(),
                    prefix,
                    max_depth: self.options.max_depth,
                });
            }

            for entry in self.list_prefix(bucket, &prefix).await? {
                if entry.name.is_empty() {
                    warn!("skipping unnamed entry under `{}` in {}", prefix, bucket);
                    continue;
                }
                let key = join_key(&prefix, &entry.name);
                if entry.is_folder() {
                    self.walk(bucket, key, depth + 1, &mut *keys, &mut *seen)
                        .await?;
                } else if seen.insert(key.clone()) {
                    keys.push(key);
                } else {
                    debug!("dropping duplicate key {} in {}", key, bucket);
                }
            }
            Ok(())
        }
        .boxed()
    }

    /// All entries directly under `prefix`, following pagination.
    async fn list_prefix(&self, bucket: &str, prefix: &str) -> Result<Vec<ListEntry>, ListError> {
        let page_size = self.options.page_size.clamp(1, MAX_PAGE_SIZE);
        let mut entries = Vec::new();
        let mut offset = 0;
        loop {
            let page = self
                .store
                .list_page(bucket, prefix, page_size, offset)
                .await
                .map_err(|source| ListError::Objects {
                    bucket: bucket.to_string(),
                    prefix: prefix.to_string(),
                    source,
                })?;
            let fetched = page.len();
            entries.extend(page);
            if fetched < page_size {
                break;
            }
            offset += fetched;
        }
        Ok(entries)
    }
}
