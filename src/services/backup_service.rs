//! BackupService: pulls every object of every bucket onto local disk.
//!
//! Layout under the backup root:
//! `<root>/<bucket>/bucket-info.json` and `<root>/<bucket>/files/<key>`,
//! plus one `<root>/export-summary.json` per run. Every path is derived from
//! bucket and key only, so re-running over the same root overwrites in place.

use super::{
    keys::{TMP_FILE_PREFIX, ensure_bucket_name_safe, ensure_key_safe, key_to_path},
    lister::{ListOptions, ObjectLister, list_buckets},
    report::write_json,
    store::{ByteStream, ObjectStore},
};
use crate::{
    errors::{ManifestError, RunError, TransferError},
    models::{
        bucket::Bucket,
        manifest::{BucketManifest, BucketResult, ExportSummary, FailedObject, size_mb},
        object::TransferOutcome,
    },
};
use chrono::Utc;
use futures::StreamExt;
use std::{
    io::{self, ErrorKind},
    path::{Path, PathBuf},
    sync::Arc,
};
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

pub const BUCKET_INFO_FILE: &str = "bucket-info.json";
pub const EXPORT_SUMMARY_FILE: &str = "export-summary.json";
pub const FILES_DIR: &str = "files";

#[derive(Clone)]
pub struct BackupService {
    store: Arc<dyn ObjectStore>,
    lister: ObjectLister,
    /// Root of the local backup tree.
    pub root: PathBuf,
}

impl BackupService {
    pub fn new(store: Arc<dyn ObjectStore>, options: ListOptions, root: impl Into<PathBuf>) -> Self {
        Self {
            lister: ObjectLister::new(store.clone(), options),
            store,
            root: root.into(),
        }
    }

    pub fn bucket_dir(&self, bucket: &str) -> PathBuf {
        self.root.join(bucket)
    }

    /// Local destination of `key`. Parent directories may not exist yet.
    pub fn object_path(&self, bucket: &str, key: &str) -> PathBuf {
        key_to_path(&self.bucket_dir(bucket).join(FILES_DIR), key)
    }

    /// Back up every bucket (or only those named in `only`) and write the
    /// export summary.
    ///
    /// Only a failed bucket enumeration or an unwritable artifact ends the
    /// run early; per-bucket and per-object failures land in the summary.
    pub async fn run(
        &self,
        project_id: &str,
        project_url: &str,
        only: &[String],
    ) -> Result<ExportSummary, RunError> {
        let started = Utc::now();
        let buckets = select_buckets(list_buckets(&*self.store).await?, only);
        info!("backing up {} buckets into {}", buckets.len(), self.root.display());

        let mut results = Vec::with_capacity(buckets.len());
        for (index, bucket) in buckets.iter().enumerate() {
            info!("bucket [{}/{}] {}", index + 1, buckets.len(), bucket.name);
            let manifest = self.backup_bucket(bucket).await?;
            results.push(manifest.result);
        }

        let summary = ExportSummary::aggregate(started, project_id, project_url, results);
        write_json(&self.root.join(EXPORT_SUMMARY_FILE), &summary).await?;
        Ok(summary)
    }

    /// Download every object of `bucket` in listing order, then persist its
    /// manifest. A listing failure is recorded in the manifest, not returned.
    ///
    /// A bucket whose name cannot be a directory under the root is recorded
    /// as errored and nothing is written for it.
    pub async fn backup_bucket(&self, bucket: &Bucket) -> Result<BucketManifest, ManifestError> {
        let mut result = BucketResult::empty(bucket, Utc::now());
        if let Err(err) = ensure_bucket_name_safe(&bucket.name) {
            warn!("skipping bucket: {}", err);
            result.error = Some(err.to_string());
            return Ok(BucketManifest {
                result,
                files: Vec::new(),
                failures: Vec::new(),
            });
        }
        let bucket_dir = self.bucket_dir(&bucket.name);
        if let Err(err) = fs::create_dir_all(bucket_dir.join(FILES_DIR)).await {
            warn!("could not create {}: {}", bucket_dir.display(), err);
        }

        let keys = match self.lister.list_all(&bucket.name, "").await {
            Ok(keys) => keys,
            Err(err) => {
                warn!("skipping objects of {}: {}", bucket.name, err);
                result.error = Some(err.to_string());
                let manifest = BucketManifest {
                    result,
                    files: Vec::new(),
                    failures: Vec::new(),
                };
                write_json(&bucket_dir.join(BUCKET_INFO_FILE), &manifest).await?;
                return Ok(manifest);
            }
        };

        let total = keys.len();
        result.total_files = total;
        info!("{}: {} files", bucket.name, total);

        let mut failures = Vec::new();
        for (index, key) in keys.iter().enumerate() {
            info!("[{}/{}] {}/{}", index + 1, total, bucket.name, key);
            match self.transfer(&bucket.name, key).await {
                TransferOutcome::Transferred(bytes) => {
                    result.downloaded_files += 1;
                    result.total_size_bytes += bytes;
                }
                TransferOutcome::Failed(error) => {
                    warn!("failed to download {}/{}: {}", bucket.name, key, error);
                    self.discard_local_copy(&bucket.name, key).await;
                    failures.push(FailedObject {
                        key: key.clone(),
                        error,
                    });
                }
            }
        }
        result.failed_files = failures.len();
        result.total_size_mb = size_mb(result.total_size_bytes);

        let manifest = BucketManifest {
            result,
            files: keys,
            failures,
        };
        write_json(&bucket_dir.join(BUCKET_INFO_FILE), &manifest).await?;
        Ok(manifest)
    }

    /// Download one object, folding any error into the outcome.
    pub async fn transfer(&self, bucket: &str, key: &str) -> TransferOutcome {
        match self.download_object(bucket, key).await {
            Ok(bytes) => TransferOutcome::Transferred(bytes),
            Err(err) => TransferOutcome::Failed(err.to_string()),
        }
    }

    /// Remove a copy left by an earlier run so the tree matches the manifest.
    async fn discard_local_copy(&self, bucket: &str, key: &str) {
        if ensure_key_safe(key).is_err() {
            return;
        }
        let path = self.object_path(bucket, key);
        match fs::remove_file(&path).await {
            Ok(()) => debug!("removed stale {}", path.display()),
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => warn!("could not remove stale {}: {}", path.display(), err),
        }
    }

    /// Stream one object to `files/<key>`.
    ///
    /// - Writes chunks to a temporary sibling file.
    /// - Flushes and syncs before renaming into place.
    /// - Removes the temporary file on any error.
    pub async fn download_object(&self, bucket: &str, key: &str) -> Result<u64, TransferError> {
        ensure_key_safe(key)?;
        let file_path = self.object_path(bucket, key);
        let parent = file_path
            .parent()
            .map(Path::to_path_buf)
            .ok_or_else(|| io::Error::other("object path missing parent directory"))?;
        fs::create_dir_all(&parent).await?;

        let stream = self.store.download(bucket, key).await?;

        let tmp_path = parent.join(format!("{}{}", TMP_FILE_PREFIX, Uuid::new_v4()));
        let file = File::create(&tmp_path).await?;
        let size_bytes = match write_stream(file, stream).await {
            Ok(size) => size,
            Err(err) => {
                let _ = fs::remove_file(&tmp_path).await;
                return Err(TransferError::Io(err));
            }
        };

        if let Err(err) = fs::rename(&tmp_path, &file_path).await {
            if err.kind() == ErrorKind::AlreadyExists {
                fs::remove_file(&file_path).await?;
                fs::rename(&tmp_path, &file_path).await?;
            } else {
                let _ = fs::remove_file(&tmp_path).await;
                return Err(TransferError::Io(err));
            }
        }
        debug!("wrote {} bytes to {}", size_bytes, file_path.display());
        Ok(size_bytes)
    }
}

async fn write_stream(mut file: File, mut stream: ByteStream) -> io::Result<u64> {
    let mut size_bytes = 0u64;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        size_bytes += chunk.len() as u64;
        file.write_all(&chunk).await?;
    }
    file.flush().await?;
    file.sync_all().await?;
    Ok(size_bytes)
}

/// Keep buckets named in `only` (all of them when empty), warning about
/// names that do not exist.
pub(crate) fn select_buckets(buckets: Vec<Bucket>, only: &[String]) -> Vec<Bucket> {
    if only.is_empty() {
        return buckets;
    }
    for name in only {
        if !buckets.iter().any(|b| &b.name == name) {
            warn!("bucket `{}` was requested but does not exist", name);
        }
    }
    buckets
        .into_iter()
        .filter(|b| only.iter().any(|name| name == &b.name))
        .collect()
}
