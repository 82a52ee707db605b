//! RestoreService: pushes a local backup tree back into the store.
//!
//! Every `<root>/<dir>/` holding a `bucket-info.json` is treated as a bucket:
//! the bucket is created or updated from the manifest, then every file under
//! `files/` is uploaded with upsert semantics, so restoring twice converges
//! on the same set of objects.

use super::{
    backup_service::{BUCKET_INFO_FILE, FILES_DIR},
    content_type::content_type_for,
    keys::{TMP_FILE_PREFIX, ensure_key_safe, relative_key},
    lister::list_buckets,
    report::{read_json, write_json},
    store::ObjectStore,
};
use crate::{
    errors::{RunError, StoreError, StoreResult, TransferError},
    models::{
        bucket::BucketSettings,
        manifest::{BucketInfo, RestoreBucketResult, RestoreSummary},
        object::TransferOutcome,
    },
};
use chrono::Utc;
use futures::StreamExt;
use std::{
    collections::HashSet,
    io,
    path::{Path, PathBuf},
    sync::Arc,
};
use tokio::fs;
use tokio_util::io::ReaderStream;
use tracing::{debug, info, warn};

pub const RESTORE_SUMMARY_FILE: &str = "restore-summary.json";

/// Sentinel the store writes to keep otherwise empty folders visible.
pub const EMPTY_FOLDER_PLACEHOLDER: &str = ".emptyFolderPlaceholder";

#[derive(Clone)]
pub struct RestoreService {
    store: Arc<dyn ObjectStore>,
    /// Root of the local backup tree.
    pub root: PathBuf,
}

impl RestoreService {
    pub fn new(store: Arc<dyn ObjectStore>, root: impl Into<PathBuf>) -> Self {
        Self {
            store,
            root: root.into(),
        }
    }

    /// Restore every bucket directory under the root (or only those named in
    /// `only`) and write the restore summary.
    pub async fn run(
        &self,
        project_id: &str,
        project_url: &str,
        only: &[String],
    ) -> Result<RestoreSummary, RunError> {
        let started = Utc::now();
        let dirs = self.bucket_dirs().await?;
        let existing: HashSet<String> = list_buckets(&*self.store)
            .await?
            .into_iter()
            .map(|b| b.name)
            .collect();

        let mut skipped = Vec::new();
        let mut results = Vec::new();
        for (dir_name, dir) in dirs {
            if !only.is_empty() && !only.contains(&dir_name) {
                debug!("not selected: {}", dir_name);
                continue;
            }

            let info_path = dir.join(BUCKET_INFO_FILE);
            if !fs::try_exists(&info_path).await.unwrap_or(false) {
                warn!("skipping {}: no {}", dir.display(), BUCKET_INFO_FILE);
                skipped.push(dir_name);
                continue;
            }
            let info: BucketInfo = match read_json(&info_path).await {
                Ok(info) => info,
                Err(err) => {
                    warn!("skipping {}: {}", dir.display(), err);
                    skipped.push(dir_name);
                    continue;
                }
            };

            let settings = info.settings(&dir_name);
            let exists = existing.contains(&settings.name);
            results.push(self.restore_bucket(&dir, &settings, exists).await);
        }

        let summary =
            RestoreSummary::aggregate(started, project_id, project_url, skipped, results);
        write_json(&self.root.join(RESTORE_SUMMARY_FILE), &summary).await?;
        Ok(summary)
    }

    /// Subdirectories of the root, sorted by name.
    async fn bucket_dirs(&self) -> Result<Vec<(String, PathBuf)>, RunError> {
        let dir_err = |source: io::Error| RunError::BackupDir {
            path: self.root.clone(),
            source,
        };
        let mut read_dir = fs::read_dir(&self.root).await.map_err(dir_err)?;
        let mut dirs = Vec::new();
        while let Some(entry) = read_dir.next_entry().await.map_err(dir_err)? {
            if !entry.file_type().await.map_err(dir_err)?.is_dir() {
                continue;
            }
            match entry.file_name().into_string() {
                Ok(name) => dirs.push((name, entry.path())),
                Err(name) => warn!("skipping non UTF-8 directory {:?}", name),
            }
        }
        dirs.sort();
        Ok(dirs)
    }

    /// Ensure the bucket, then upload every file under `dir/files/`.
    pub async fn restore_bucket(
        &self,
        dir: &Path,
        settings: &BucketSettings,
        exists: bool,
    ) -> RestoreBucketResult {
        let mut result = RestoreBucketResult::empty(&settings.name);
        info!("restoring bucket {} from {}", settings.name, dir.display());

        if let Err(err) = self.ensure_bucket(settings, exists).await {
            warn!("cannot prepare bucket {}: {}", settings.name, err);
            result.error = Some(format!("bucket metadata: {err}"));
            return result;
        }

        let files_root = dir.join(FILES_DIR);
        if !fs::try_exists(&files_root).await.unwrap_or(false) {
            info!("{}: no files directory, nothing to upload", settings.name);
            return result;
        }
        let files = match collect_files(&files_root).await {
            Ok(files) => files,
            Err(err) => {
                warn!("cannot walk {}: {}", files_root.display(), err);
                result.error = Some(format!("walking {}: {err}", files_root.display()));
                return result;
            }
        };

        result.total_files = files.len();
        for (index, path) in files.iter().enumerate() {
            let Some(key) = path
                .strip_prefix(&files_root)
                .ok()
                .and_then(relative_key)
            else {
                warn!("cannot derive an object key for {}", path.display());
                result.failed_files += 1;
                continue;
            };
            info!("[{}/{}] {}/{}", index + 1, files.len(), settings.name, key);
            match self.transfer(&settings.name, path, &key).await {
                TransferOutcome::Transferred(bytes) => {
                    result.uploaded_files += 1;
                    result.total_size_bytes += bytes;
                }
                TransferOutcome::Failed(error) => {
                    warn!("failed to upload {}/{}: {}", settings.name, key, error);
                    result.failed_files += 1;
                }
            }
        }
        result
    }

    /// Make the remote bucket match `settings`, whichever way round it is.
    ///
    /// Last write wins: a bucket created or deleted concurrently between the
    /// listing and this call is handled by falling back to the other branch.
    pub async fn ensure_bucket(&self, settings: &BucketSettings, exists: bool) -> StoreResult<()> {
        if exists {
            warn!(
                "bucket {} already exists; overwriting its settings from the backup (public={}, file_size_limit={:?}, allowed_mime_types={:?})",
                settings.name, settings.public, settings.file_size_limit, settings.allowed_mime_types
            );
            match self.store.update_bucket(settings).await {
                Err(StoreError::BucketNotFound(_)) => self.store.create_bucket(settings).await,
                other => other,
            }
        } else {
            match self.store.create_bucket(settings).await {
                Ok(()) => {
                    info!("created bucket {}", settings.name);
                    Ok(())
                }
                Err(StoreError::AlreadyExists(_)) => self.store.update_bucket(settings).await,
                Err(err) => Err(err),
            }
        }
    }

    pub async fn transfer(&self, bucket: &str, path: &Path, key: &str) -> TransferOutcome {
        match self.upload_file(bucket, path, key).await {
            Ok(bytes) => TransferOutcome::Transferred(bytes),
            Err(err) => TransferOutcome::Failed(err.to_string()),
        }
    }

    /// Stream `path` to `key`, overwriting whatever is stored there.
    pub async fn upload_file(
        &self,
        bucket: &str,
        path: &Path,
        key: &str,
    ) -> Result<u64, TransferError> {
        ensure_key_safe(key)?;
        let length = fs::metadata(path).await?.len();
        let file = fs::File::open(path).await?;
        let body = ReaderStream::new(file).boxed();
        let content_type = content_type_for(key);

        self.store
            .upload(bucket, key, content_type, length, body, true)
            .await?;
        debug!("uploaded {} bytes as {} ({})", length, key, content_type);
        Ok(length)
    }
}

/// Regular files under `root`, depth-first with each directory's entries in
/// name order. Placeholders, leftovers of interrupted downloads, and
/// non-regular files are skipped.
async fn collect_files(root: &Path) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut pending = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        let mut entries = Vec::new();
        let mut read_dir = fs::read_dir(&dir).await?;
        while let Some(entry) = read_dir.next_entry().await? {
            entries.push((entry.file_name(), entry.path(), entry.file_type().await?));
        }
        entries.sort_by(|a, b| a.0.cmp(&b.0));

        let mut subdirs = Vec::new();
        for (name, path, file_type) in entries {
            if file_type.is_dir() {
                subdirs.push(path);
            } else if !file_type.is_file() {
                warn!("skipping non-regular file {}", path.display());
            } else if name == EMPTY_FOLDER_PLACEHOLDER {
                debug!("skipping placeholder {}", path.display());
            } else if name.to_string_lossy().starts_with(TMP_FILE_PREFIX) {
                warn!("skipping partial download {}", path.display());
            } else {
                files.push(path);
            }
        }
        // reversed so the stack pops them in name order
        pending.extend(subdirs.into_iter().rev());
    }
    Ok(files)
}
