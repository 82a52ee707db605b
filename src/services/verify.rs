//! Offline verification of a backup tree against its own manifests.
//!
//! `export-summary.json` is the entry point; each bucket it lists must have a
//! `bucket-info.json` whose counts add up and whose downloaded files are all
//! present on disk with the recorded total size.

use super::{
    backup_service::{BUCKET_INFO_FILE, EXPORT_SUMMARY_FILE, FILES_DIR},
    keys::{ensure_bucket_name_safe, ensure_key_safe, key_to_path},
    report::read_json,
};
use crate::{
    errors::ManifestError,
    models::manifest::{BucketManifest, BucketResult, ExportSummary},
};
use std::{collections::HashSet, path::Path};
use tokio::fs;
use tracing::{debug, warn};

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct VerifyReport {
    pub buckets_checked: usize,
    pub files_present: usize,
    pub bytes_present: u64,
    /// `bucket/key` entries recorded as downloaded but absent on disk.
    pub missing: Vec<String>,
    /// Count or size inconsistencies, one line each.
    pub problems: Vec<String>,
}

impl VerifyReport {
    pub fn ok(&self) -> bool {
        self.missing.is_empty() && self.problems.is_empty()
    }
}

/// Verify the backup rooted at `root`. Only an unreadable export summary is
/// an error; everything else is reported.
pub async fn verify_backup(root: &Path) -> Result<VerifyReport, ManifestError> {
    let summary: ExportSummary = read_json(&root.join(EXPORT_SUMMARY_FILE)).await?;
    let mut report = VerifyReport::default();

    let totals = (
        summary.buckets.iter().map(|b| b.total_files).sum::<usize>(),
        summary.buckets.iter().map(|b| b.downloaded_files).sum::<usize>(),
        summary.buckets.iter().map(|b| b.failed_files).sum::<usize>(),
    );
    if summary.total_buckets != summary.buckets.len()
        || totals != (summary.total_files, summary.total_downloaded, summary.total_failed)
    {
        report
            .problems
            .push("export summary totals do not match its bucket entries".to_string());
    }

    for entry in &summary.buckets {
        report.buckets_checked += 1;
        if ensure_bucket_name_safe(&entry.name).is_err() {
            warn!("{:?}: bucket was never written to disk", entry.name);
            continue;
        }
        let bucket_dir = root.join(&entry.name);
        let manifest: BucketManifest = match read_json(&bucket_dir.join(BUCKET_INFO_FILE)).await {
            Ok(manifest) => manifest,
            Err(err) => {
                report.problems.push(format!("{}: {}", entry.name, err));
                continue;
            }
        };
        verify_bucket(&bucket_dir, entry, &manifest, &mut report).await;
    }
    Ok(report)
}

async fn verify_bucket(
    bucket_dir: &Path,
    entry: &BucketResult,
    manifest: &BucketManifest,
    report: &mut VerifyReport,
) {
    let name = &entry.name;
    let recorded = &manifest.result;
    if (recorded.total_files, recorded.downloaded_files, recorded.failed_files)
        != (entry.total_files, entry.downloaded_files, entry.failed_files)
    {
        report
            .problems
            .push(format!("{name}: bucket-info.json disagrees with export summary"));
    }
    if recorded.error.is_some() {
        warn!("{}: listing failed during backup, nothing to verify", name);
        return;
    }
    if recorded.downloaded_files + recorded.failed_files != recorded.total_files
        || recorded.total_files != manifest.files.len()
    {
        report.problems.push(format!(
            "{name}: {} downloaded + {} failed does not account for {} files",
            recorded.downloaded_files, recorded.failed_files, manifest.files.len()
        ));
    }

    let failed: HashSet<&str> = manifest.failures.iter().map(|f| f.key.as_str()).collect();
    let files_root = bucket_dir.join(FILES_DIR);
    let mut present = 0usize;
    let mut bytes = 0u64;
    for key in &manifest.files {
        if ensure_key_safe(key).is_err() {
            debug!("{}: skipping unsafe key {}", name, key);
            continue;
        }
        // a failed key may still have a copy from an earlier run
        if failed.contains(key.as_str()) {
            continue;
        }
        match fs::metadata(key_to_path(&files_root, key)).await {
            Ok(meta) if meta.is_file() => {
                present += 1;
                bytes += meta.len();
            }
            _ => report.missing.push(format!("{name}/{key}")),
        }
    }

    if present != recorded.downloaded_files {
        report.problems.push(format!(
            "{name}: {present} files on disk, {} recorded as downloaded",
            recorded.downloaded_files
        ));
    }
    if bytes != recorded.total_size_bytes {
        report.problems.push(format!(
            "{name}: {bytes} bytes on disk, {} recorded",
            recorded.total_size_bytes
        ));
    }
    report.files_present += present;
    report.bytes_present += bytes;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::{
        backup_service::BackupService, lister::ListOptions, memory_store::MemoryStore,
    };
    use std::sync::Arc;
    use tempfile::TempDir;

    async fn backed_up() -> TempDir {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(MemoryStore::new());
        store.put_object("images", "cat.jpg", "meow", "image/jpeg");
        store.put_object("images", "products/shoe.png", "shoe", "image/png");
        store.put_object("docs", "a.txt", "a", "text/plain");
        store.put_object("docs", "b.txt", "b", "text/plain");
        store.fail_download("docs", "b.txt");
        BackupService::new(store, ListOptions::default(), dir.path())
            .run("p", "u", &[])
            .await
            .unwrap();
        dir
    }

    #[tokio::test]
    async fn fresh_backup_verifies() {
        let dir = backed_up().await;
        let report = verify_backup(dir.path()).await.unwrap();
        assert!(report.ok(), "{report:?}");
        assert_eq!(report.buckets_checked, 2);
        assert_eq!(report.files_present, 3);
        assert_eq!(report.bytes_present, 9);
    }

    #[tokio::test]
    async fn deleted_file_is_reported_missing() {
        let dir = backed_up().await;
        std::fs::remove_file(dir.path().join("images/files/products/shoe.png")).unwrap();

        let report = verify_backup(dir.path()).await.unwrap();
        assert!(!report.ok());
        assert_eq!(report.missing, vec!["images/products/shoe.png"]);
        assert!(report.problems.iter().any(|p| p.starts_with("images:")));
    }

    #[tokio::test]
    async fn truncated_file_is_a_size_problem() {
        let dir = backed_up().await;
        std::fs::write(dir.path().join("images/files/cat.jpg"), b"me").unwrap();

        let report = verify_backup(dir.path()).await.unwrap();
        assert!(report.missing.is_empty());
        assert_eq!(report.problems.len(), 1);
        assert!(report.problems[0].contains("bytes on disk"));
    }

    #[tokio::test]
    async fn stale_copy_of_a_failed_key_is_not_counted() {
        let dir = backed_up().await;
        // leftover from a run where b.txt still downloaded
        std::fs::write(dir.path().join("docs/files/b.txt"), b"old b").unwrap();

        let report = verify_backup(dir.path()).await.unwrap();
        assert!(report.ok(), "{report:?}");
        assert_eq!(report.files_present, 3);
        assert_eq!(report.bytes_present, 9);
    }

    #[tokio::test]
    async fn unsafe_bucket_entries_are_not_followed() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("backup");
        let store = Arc::new(MemoryStore::new());
        store.put_object("..", "x.txt", "x", "text/plain");
        store.put_object("docs", "a.txt", "a", "text/plain");
        BackupService::new(store, ListOptions::default(), &root)
            .run("p", "u", &[])
            .await
            .unwrap();

        let report = verify_backup(&root).await.unwrap();
        assert!(report.ok(), "{report:?}");
        assert_eq!(report.buckets_checked, 2);
        assert_eq!(report.files_present, 1);
    }

    #[tokio::test]
    async fn missing_summary_is_an_error() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            verify_backup(dir.path()).await,
            Err(ManifestError::Read { .. })
        ));
    }
}
