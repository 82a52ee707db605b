//! In-memory [`ObjectStore`] with the same folder synthesis as the remote
//! listing API, plus failure injection. Suitable for development and testing.

use super::store::{ByteStream, ObjectStore};
use crate::{
    errors::{StoreError, StoreResult},
    models::{
        bucket::{Bucket, BucketSettings},
        object::ListEntry,
    },
};
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use chrono::Utc;
use futures::{StreamExt, stream};
use serde_json::json;
use std::{
    collections::{BTreeMap, HashSet},
    sync::{Mutex, MutexGuard, PoisonError},
};
use uuid::Uuid;

/// An object held by [`MemoryStore`].
#[derive(Clone, Debug, PartialEq)]
pub struct StoredObject {
    pub id: Uuid,
    pub data: Bytes,
    pub content_type: String,
}

#[derive(Default)]
struct State {
    buckets: BTreeMap<String, Bucket>,
    /// bucket name -> key -> object
    objects: BTreeMap<String, BTreeMap<String, StoredObject>>,
    fail_bucket_listing: bool,
    failing_prefixes: HashSet<(String, String)>,
    failing_downloads: HashSet<(String, String)>,
    failing_uploads: HashSet<(String, String)>,
    failing_bucket_writes: HashSet<String>,
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add (or replace) a bucket without going through `create_bucket`.
    pub fn insert_bucket(&self, settings: BucketSettings) {
        let mut state = self.state();
        let mut bucket = settings.to_bucket();
        bucket.created_at = Some(Utc::now());
        state.objects.entry(bucket.name.clone()).or_default();
        state.buckets.insert(bucket.name.clone(), bucket);
    }

    /// Put an object directly, creating a private bucket if needed.
    pub fn put_object(
        &self,
        bucket: &str,
        key: &str,
        data: impl Into<Bytes>,
        content_type: &str,
    ) {
        let mut state = self.state();
        if !state.buckets.contains_key(bucket) {
            let mut record = BucketSettings::private(bucket).to_bucket();
            record.created_at = Some(Utc::now());
            state.buckets.insert(bucket.to_string(), record);
        }
        state.objects.entry(bucket.to_string()).or_default().insert(
            key.to_string(),
            StoredObject {
                id: Uuid::new_v4(),
                data: data.into(),
                content_type: content_type.to_string(),
            },
        );
    }

    pub fn bucket(&self, name: &str) -> Option<Bucket> {
        self.state().buckets.get(name).cloned()
    }

    pub fn object(&self, bucket: &str, key: &str) -> Option<StoredObject> {
        self.state()
            .objects
            .get(bucket)
            .and_then(|objects| objects.get(key))
            .cloned()
    }

    /// All keys in `bucket`, sorted.
    pub fn keys(&self, bucket: &str) -> Vec<String> {
        self.state()
            .objects
            .get(bucket)
            .map(|objects| objects.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn fail_bucket_listing(&self) {
        self.state().fail_bucket_listing = true;
    }

    /// Make listing `prefix` (`""` for the root) in `bucket` fail.
    pub fn fail_listing(&self, bucket: &str, prefix: &str) {
        self.state()
            .failing_prefixes
            .insert((bucket.to_string(), prefix.to_string()));
    }

    pub fn fail_download(&self, bucket: &str, key: &str) {
        self.state()
            .failing_downloads
            .insert((bucket.to_string(), key.to_string()));
    }

    pub fn fail_upload(&self, bucket: &str, key: &str) {
        self.state()
            .failing_uploads
            .insert((bucket.to_string(), key.to_string()));
    }

    /// Make both create and update of `bucket` fail.
    pub fn fail_bucket_writes(&self, bucket: &str) {
        self.state().failing_bucket_writes.insert(bucket.to_string());
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn list_buckets(&self) -> StoreResult<Vec<Bucket>> {
        let state = self.state();
        if state.fail_bucket_listing {
            return Err(StoreError::Injected("bucket listing".into()));
        }
        Ok(state.buckets.values().cloned().collect())
    }

    async fn list_page(
        &self,
        bucket: &str,
        prefix: &str,
        limit: usize,
        offset: usize,
    ) -> StoreResult<Vec<ListEntry>> {
        let state = self.state();
        let normalized = prefix.trim_end_matches('/');
        if state
            .failing_prefixes
            .contains(&(bucket.to_string(), normalized.to_string()))
        {
            return Err(StoreError::Injected(format!("listing {bucket}/{normalized}")));
        }
        let objects = state
            .objects
            .get(bucket)
            .ok_or_else(|| StoreError::BucketNotFound(bucket.to_string()))?;

        let base = if normalized.is_empty() {
            String::new()
        } else {
            format!("{normalized}/")
        };

        let mut folders = HashSet::new();
        let mut entries = Vec::new();
        for (key, object) in objects.iter().filter(|(key, _)| key.starts_with(&base)) {
            let rest = &key[base.len()..];
            match rest.find('/') {
                Some(pos) => {
                    let folder = &rest[..pos];
                    if folders.insert(folder.to_string()) {
                        entries.push(ListEntry::folder(folder));
                    }
                }
                None => entries.push(ListEntry {
                    name: rest.to_string(),
                    id: Some(object.id.to_string()),
                    metadata: Some(json!({
                        "size": object.data.len(),
                        "mimetype": object.content_type,
                    })),
                }),
            }
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));

        Ok(entries.into_iter().skip(offset).take(limit).collect())
    }

    async fn download(&self, bucket: &str, key: &str) -> StoreResult<ByteStream> {
        let state = self.state();
        if state
            .failing_downloads
            .contains(&(bucket.to_string(), key.to_string()))
        {
            return Err(StoreError::Injected(format!("download {bucket}/{key}")));
        }
        let object = state
            .objects
            .get(bucket)
            .ok_or_else(|| StoreError::BucketNotFound(bucket.to_string()))?
            .get(key)
            .ok_or_else(|| StoreError::ObjectNotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            })?;
        let data = object.data.clone();
        Ok(stream::iter(vec![Ok(data)]).boxed())
    }

    async fn upload(
        &self,
        bucket: &str,
        key: &str,
        content_type: &str,
        length: u64,
        mut body: ByteStream,
        upsert: bool,
    ) -> StoreResult<()> {
        let mut buf = BytesMut::new();
        while let Some(chunk) = body.next().await {
            buf.extend_from_slice(&chunk?);
        }
        if buf.len() as u64 != length {
            return Err(StoreError::Decode(format!(
                "declared {length} bytes but received {}",
                buf.len()
            )));
        }

        let mut state = self.state();
        if state
            .failing_uploads
            .contains(&(bucket.to_string(), key.to_string()))
        {
            return Err(StoreError::Injected(format!("upload {bucket}/{key}")));
        }
        let record = state
            .buckets
            .get(bucket)
            .ok_or_else(|| StoreError::BucketNotFound(bucket.to_string()))?;
        if let Some(limit) = record.file_size_limit {
            if length > limit {
                return Err(StoreError::Status {
                    status: 413,
                    message: format!("object exceeds the {limit} byte limit"),
                });
            }
        }
        if let Some(allowed) = &record.allowed_mime_types {
            if !allowed.iter().any(|pattern| mime_matches(pattern, content_type)) {
                return Err(StoreError::Status {
                    status: 415,
                    message: format!("mime type {content_type} is not supported"),
                });
            }
        }

        let objects = state.objects.entry(bucket.to_string()).or_default();
        if !upsert && objects.contains_key(key) {
            return Err(StoreError::AlreadyExists(format!("{bucket}/{key}")));
        }
        objects.insert(
            key.to_string(),
            StoredObject {
                id: Uuid::new_v4(),
                data: buf.freeze(),
                content_type: content_type.to_string(),
            },
        );
        Ok(())
    }

    async fn create_bucket(&self, settings: &BucketSettings) -> StoreResult<()> {
        let mut state = self.state();
        if state.failing_bucket_writes.contains(&settings.name) {
            return Err(StoreError::Injected(format!("create bucket {}", settings.name)));
        }
        if state.buckets.contains_key(&settings.name) {
            return Err(StoreError::AlreadyExists(settings.name.clone()));
        }
        let mut bucket = settings.to_bucket();
        bucket.created_at = Some(Utc::now());
        state.objects.entry(bucket.name.clone()).or_default();
        state.buckets.insert(bucket.name.clone(), bucket);
        Ok(())
    }

    async fn update_bucket(&self, settings: &BucketSettings) -> StoreResult<()> {
        let mut state = self.state();
        if state.failing_bucket_writes.contains(&settings.name) {
            return Err(StoreError::Injected(format!("update bucket {}", settings.name)));
        }
        let bucket = state
            .buckets
            .get_mut(&settings.name)
            .ok_or_else(|| StoreError::BucketNotFound(settings.name.clone()))?;
        bucket.public = settings.public;
        bucket.file_size_limit = settings.file_size_limit;
        bucket.allowed_mime_types = settings.allowed_mime_types.clone();
        bucket.updated_at = Some(Utc::now());
        Ok(())
    }
}

/// `image/*` style matching for allowed content types.
fn mime_matches(pattern: &str, content_type: &str) -> bool {
    match pattern.strip_suffix("/*") {
        Some(family) => content_type
            .split_once('/')
            .is_some_and(|(top, _)| top.eq_ignore_ascii_case(family)),
        None => pattern.eq_ignore_ascii_case(content_type),
    }
}
