//! JSON artifact I/O and the end-of-run summary block.

use super::keys::TMP_FILE_PREFIX;
use crate::{
    errors::ManifestError,
    models::manifest::{ExportSummary, RestoreSummary},
};
use serde::{Serialize, de::DeserializeOwned};
use std::{io, path::Path};
use tokio::{fs, io::AsyncWriteExt};
use tracing::{info, warn};
use uuid::Uuid;

/// Pretty-print `value` to `path`, replacing any previous file atomically.
pub async fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), ManifestError> {
    let encoded = serde_json::to_vec_pretty(value).map_err(|source| ManifestError::Encode {
        path: path.to_path_buf(),
        source,
    })?;
    let write_err = |source: io::Error| ManifestError::Write {
        path: path.to_path_buf(),
        source,
    };

    let parent = path
        .parent()
        .ok_or_else(|| write_err(io::Error::other("artifact path has no parent directory")))?;
    fs::create_dir_all(parent).await.map_err(write_err)?;

    let tmp_path = parent.join(format!("{}{}", TMP_FILE_PREFIX, Uuid::new_v4()));
    let result = async {
        let mut file = fs::File::create(&tmp_path).await?;
        file.write_all(&encoded).await?;
        file.write_all(b"\n").await?;
        file.sync_all().await?;
        fs::rename(&tmp_path, path).await
    }
    .await;

    if let Err(err) = result {
        let _ = fs::remove_file(&tmp_path).await;
        return Err(write_err(err));
    }
    Ok(())
}

pub async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, ManifestError> {
    let raw = fs::read(path).await.map_err(|source| ManifestError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_slice(&raw).map_err(|source| ManifestError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

pub fn log_export_summary(summary: &ExportSummary) {
    info!("==== storage backup summary ====");
    info!("project:     {}", summary.project_id);
    info!("buckets:     {}", summary.total_buckets);
    info!("files:       {}", summary.total_files);
    info!("downloaded:  {}", summary.total_downloaded);
    info!("failed:      {}", summary.total_failed);
    info!(
        "size:        {} bytes ({} MB)",
        summary.total_size_bytes, summary.total_size_mb
    );
    for bucket in &summary.buckets {
        match &bucket.error {
            Some(err) => warn!("  {}: listing failed: {}", bucket.name, err),
            None => info!(
                "  {}: {}/{} files, {} failed",
                bucket.name, bucket.downloaded_files, bucket.total_files, bucket.failed_files
            ),
        }
    }
    let errored = summary.errored_buckets();
    if summary.total_failed > 0 || errored > 0 {
        warn!(
            "backup finished with {} failed files and {} unlisted buckets; inspect export-summary.json",
            summary.total_failed, errored
        );
    }
}

pub fn log_restore_summary(summary: &RestoreSummary) {
    info!("==== storage restore summary ====");
    info!("project:     {}", summary.project_id);
    info!("buckets:     {}", summary.total_buckets);
    info!("files:       {}", summary.total_files);
    info!("uploaded:    {}", summary.total_uploaded);
    info!("failed:      {}", summary.total_failed);
    info!(
        "size:        {} bytes ({} MB)",
        summary.total_size_bytes, summary.total_size_mb
    );
    for dir in &summary.skipped_directories {
        warn!("  skipped {}: no usable bucket-info.json", dir);
    }
    for bucket in &summary.buckets {
        match &bucket.error {
            Some(err) => warn!("  {}: {}", bucket.name, err),
            None => info!(
                "  {}: {}/{} files, {} failed",
                bucket.name, bucket.uploaded_files, bucket.total_files, bucket.failed_files
            ),
        }
    }
    let errored = summary.buckets.iter().filter(|b| b.error.is_some()).count();
    if summary.total_failed > 0 || errored > 0 {
        warn!(
            "restore finished with {} failed files and {} failed buckets; inspect restore-summary.json",
            summary.total_failed, errored
        );
    }
}
