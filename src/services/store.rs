//! The object-store seam.
//!
//! Every pipeline component receives an `Arc<dyn ObjectStore>` instead of
//! reaching for a process-wide client, so tests can hand in a
//! [`MemoryStore`](super::memory_store::MemoryStore).

use crate::{
    errors::StoreResult,
    models::{
        bucket::{Bucket, BucketSettings},
        object::ListEntry,
    },
};
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use std::io;

/// Body of an object, streamed in chunks.
pub type ByteStream = BoxStream<'static, io::Result<Bytes>>;

/// Bucket-oriented object storage, modeled on the Supabase Storage API.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// All buckets visible to the configured credentials.
    async fn list_buckets(&self) -> StoreResult<Vec<Bucket>>;

    /// One page of entries directly under `prefix`, sorted by name ascending.
    ///
    /// Files come back with an `id`; shared sub-prefixes come back as folder
    /// entries without one.
    async fn list_page(
        &self,
        bucket: &str,
        prefix: &str,
        limit: usize,
        offset: usize,
    ) -> StoreResult<Vec<ListEntry>>;

    /// Stream the content of `key`.
    async fn download(&self, bucket: &str, key: &str) -> StoreResult<ByteStream>;

    /// Store `body` (exactly `length` bytes) at `key`. With `upsert` an
    /// existing object is overwritten instead of rejected.
    async fn upload(
        &self,
        bucket: &str,
        key: &str,
        content_type: &str,
        length: u64,
        body: ByteStream,
        upsert: bool,
    ) -> StoreResult<()>;

    /// Create a bucket. Fails with `AlreadyExists` when the name is taken.
    async fn create_bucket(&self, settings: &BucketSettings) -> StoreResult<()>;

    /// Replace a bucket's settings. Fails with `BucketNotFound` when missing.
    async fn update_bucket(&self, settings: &BucketSettings) -> StoreResult<()>;
}
