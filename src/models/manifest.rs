//! Persisted JSON artifacts: per-bucket `bucket-info.json`, the run-level
//! `export-summary.json`, and `restore-summary.json`.
//!
//! Field names follow the artifact format (mixed snake/camel case) so older
//! backups stay readable.

use super::bucket::{Bucket, BucketSettings};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Per-bucket backup outcome, as embedded in the export summary.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct BucketResult {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub public: bool,
    #[serde(default)]
    pub file_size_limit: Option<u64>,
    #[serde(default)]
    pub allowed_mime_types: Option<Vec<String>>,
    #[serde(rename = "exportDate")]
    pub export_date: DateTime<Utc>,
    #[serde(rename = "totalFiles")]
    pub total_files: usize,
    #[serde(rename = "downloadedFiles")]
    pub downloaded_files: usize,
    #[serde(rename = "failedFiles")]
    pub failed_files: usize,
    #[serde(rename = "totalSizeBytes")]
    pub total_size_bytes: u64,
    #[serde(rename = "totalSizeMB")]
    pub total_size_mb: f64,
    /// Set when the bucket's keys could not be enumerated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BucketResult {
    /// A zero-count result for `bucket`, before any transfer happened.
    pub fn empty(bucket: &Bucket, export_date: DateTime<Utc>) -> Self {
        Self {
            name: bucket.name.clone(),
            id: Some(bucket.id.clone()),
            public: bucket.public,
            file_size_limit: bucket.file_size_limit,
            allowed_mime_types: bucket.allowed_mime_types.clone(),
            export_date,
            total_files: 0,
            downloaded_files: 0,
            failed_files: 0,
            total_size_bytes: 0,
            total_size_mb: 0.0,
            error: None,
        }
    }
}

/// One failed object inside a bucket manifest.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct FailedObject {
    pub key: String,
    pub error: String,
}

/// Contents of `<backupRoot>/<bucket>/bucket-info.json`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct BucketManifest {
    #[serde(flatten)]
    pub result: BucketResult,
    /// Every enumerated key, in listing order.
    pub files: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<FailedObject>,
}

/// Lenient view of `bucket-info.json` used by restore.
///
/// Only the bucket settings are required to recreate a bucket; everything
/// else in the file is ignored.
#[derive(Deserialize, Clone, Debug, PartialEq)]
pub struct BucketInfo {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub public: bool,
    #[serde(default)]
    pub file_size_limit: Option<u64>,
    #[serde(default)]
    pub allowed_mime_types: Option<Vec<String>>,
}

impl BucketInfo {
    /// Settings to apply, using `dir_name` when the file omits `name`.
    pub fn settings(&self, dir_name: &str) -> BucketSettings {
        BucketSettings {
            name: self.name.clone().unwrap_or_else(|| dir_name.to_string()),
            public: self.public,
            file_size_limit: self.file_size_limit,
            allowed_mime_types: self.allowed_mime_types.clone(),
        }
    }
}

/// Contents of `<backupRoot>/export-summary.json`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ExportSummary {
    #[serde(rename = "exportDate")]
    pub export_date: DateTime<Utc>,
    #[serde(rename = "projectId")]
    pub project_id: String,
    #[serde(rename = "projectUrl")]
    pub project_url: String,
    #[serde(rename = "totalBuckets")]
    pub total_buckets: usize,
    #[serde(rename = "totalFiles")]
    pub total_files: usize,
    #[serde(rename = "totalDownloaded")]
    pub total_downloaded: usize,
    #[serde(rename = "totalFailed")]
    pub total_failed: usize,
    #[serde(rename = "totalSizeBytes")]
    pub total_size_bytes: u64,
    #[serde(rename = "totalSizeMB")]
    pub total_size_mb: f64,
    pub buckets: Vec<BucketResult>,
}

impl ExportSummary {
    pub fn aggregate(
        export_date: DateTime<Utc>,
        project_id: impl Into<String>,
        project_url: impl Into<String>,
        buckets: Vec<BucketResult>,
    ) -> Self {
        let total_files = buckets.iter().map(|b| b.total_files).sum();
        let total_downloaded = buckets.iter().map(|b| b.downloaded_files).sum();
        let total_failed = buckets.iter().map(|b| b.failed_files).sum();
        let total_size_bytes = buckets.iter().map(|b| b.total_size_bytes).sum();

        Self {
            export_date,
            project_id: project_id.into(),
            project_url: project_url.into(),
            total_buckets: buckets.len(),
            total_files,
            total_downloaded,
            total_failed,
            total_size_bytes,
            total_size_mb: size_mb(total_size_bytes),
            buckets,
        }
    }

    /// Buckets whose enumeration failed.
    pub fn errored_buckets(&self) -> usize {
        self.buckets.iter().filter(|b| b.error.is_some()).count()
    }
}

/// Per-bucket restore outcome.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct RestoreBucketResult {
    pub name: String,
    #[serde(rename = "totalFiles")]
    pub total_files: usize,
    #[serde(rename = "uploadedFiles")]
    pub uploaded_files: usize,
    #[serde(rename = "failedFiles")]
    pub failed_files: usize,
    #[serde(rename = "totalSizeBytes")]
    pub total_size_bytes: u64,
    /// Set when the bucket could not be created/updated or its tree not walked.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RestoreBucketResult {
    pub fn empty(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            total_files: 0,
            uploaded_files: 0,
            failed_files: 0,
            total_size_bytes: 0,
            error: None,
        }
    }
}

/// Contents of `<backupRoot>/restore-summary.json`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct RestoreSummary {
    #[serde(rename = "restoreDate")]
    pub restore_date: DateTime<Utc>,
    #[serde(rename = "projectId")]
    pub project_id: String,
    #[serde(rename = "projectUrl")]
    pub project_url: String,
    #[serde(rename = "totalBuckets")]
    pub total_buckets: usize,
    #[serde(rename = "totalFiles")]
    pub total_files: usize,
    #[serde(rename = "totalUploaded")]
    pub total_uploaded: usize,
    #[serde(rename = "totalFailed")]
    pub total_failed: usize,
    #[serde(rename = "totalSizeBytes")]
    pub total_size_bytes: u64,
    #[serde(rename = "totalSizeMB")]
    pub total_size_mb: f64,
    /// Directories under the backup root that carried no `bucket-info.json`.
    #[serde(rename = "skippedDirectories")]
    pub skipped_directories: Vec<String>,
    pub buckets: Vec<RestoreBucketResult>,
}

impl RestoreSummary {
    pub fn aggregate(
        restore_date: DateTime<Utc>,
        project_id: impl Into<String>,
        project_url: impl Into<String>,
        skipped_directories: Vec<String>,
        buckets: Vec<RestoreBucketResult>,
    ) -> Self {
        let total_files = buckets.iter().map(|b| b.total_files).sum();
        let total_uploaded = buckets.iter().map(|b| b.uploaded_files).sum();
        let total_failed = buckets.iter().map(|b| b.failed_files).sum();
        let total_size_bytes = buckets.iter().map(|b| b.total_size_bytes).sum();

        Self {
            restore_date,
            project_id: project_id.into(),
            project_url: project_url.into(),
            total_buckets: buckets.len(),
            total_files,
            total_uploaded,
            total_failed,
            total_size_bytes,
            total_size_mb: size_mb(total_size_bytes),
            skipped_directories,
            buckets,
        }
    }
}

/// Bytes to mebibytes, rounded to two decimals.
pub fn size_mb(bytes: u64) -> f64 {
    (bytes as f64 / 1_048_576.0 * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn date() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
    }

    fn result(name: &str, total: usize, downloaded: usize, bytes: u64) -> BucketResult {
        let mut r = BucketResult::empty(&BucketSettings::private(name).to_bucket(), date());
        r.total_files = total;
        r.downloaded_files = downloaded;
        r.failed_files = total - downloaded;
        r.total_size_bytes = bytes;
        r.total_size_mb = size_mb(bytes);
        r
    }

    #[test]
    fn size_mb_rounds_to_two_decimals() {
        assert_eq!(size_mb(0), 0.0);
        assert_eq!(size_mb(1_048_576), 1.0);
        assert_eq!(size_mb(1_572_864), 1.5);
        assert_eq!(size_mb(1_000), 0.0);
        assert_eq!(size_mb(10_485), 0.01);
    }

    #[test]
    fn export_summary_sums_bucket_results() {
        let summary = ExportSummary::aggregate(
            date(),
            "abc",
            "https://abc.supabase.co",
            vec![result("images", 3, 2, 300), result("docs", 1, 1, 50)],
        );

        assert_eq!(summary.total_buckets, 2);
        assert_eq!(summary.total_files, 4);
        assert_eq!(summary.total_downloaded, 3);
        assert_eq!(summary.total_failed, 1);
        assert_eq!(summary.total_size_bytes, 350);
        assert_eq!(summary.errored_buckets(), 0);
    }

    #[test]
    fn bucket_manifest_uses_artifact_field_names() {
        let manifest = BucketManifest {
            result: result("images", 2, 2, 10),
            files: vec!["cat.jpg".into(), "products/shoe.png".into()],
            failures: Vec::new(),
        };
        let json = serde_json::to_value(&manifest).unwrap();

        assert_eq!(json["name"], "images");
        assert_eq!(json["public"], false);
        assert!(json["file_size_limit"].is_null());
        assert!(json["allowed_mime_types"].is_null());
        assert_eq!(json["totalFiles"], 2);
        assert_eq!(json["downloadedFiles"], 2);
        assert_eq!(json["failedFiles"], 0);
        assert_eq!(json["totalSizeBytes"], 10);
        assert!(json["exportDate"].is_string());
        assert_eq!(json["files"][1], "products/shoe.png");
        assert!(json.get("failures").is_none());
        assert!(json.get("error").is_none());

        let back: BucketManifest = serde_json::from_value(json).unwrap();
        assert_eq!(back, manifest);
    }

    #[test]
    fn bucket_info_reads_minimal_documents() {
        let info: BucketInfo = serde_json::from_str(
            r#"{"public":true,"file_size_limit":5242880,"allowed_mime_types":["image/png"]}"#,
        )
        .unwrap();
        let settings = info.settings("avatars");

        assert_eq!(settings.name, "avatars");
        assert!(settings.public);
        assert_eq!(settings.file_size_limit, Some(5_242_880));
        assert_eq!(
            settings.allowed_mime_types,
            Some(vec!["image/png".to_string()])
        );
    }
}
