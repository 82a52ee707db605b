use crate::{config::AppConfig, services::verify::verify_backup};
use anyhow::{Context, Result, bail};
use tracing::{info, warn};

/// Offline check of the backup tree; fails when anything is missing or off.
pub async fn verify(cfg: &AppConfig) -> Result<()> {
    let report = verify_backup(&cfg.backup_dir)
        .await
        .with_context(|| format!("verifying {}", cfg.backup_dir.display()))?;

    info!(
        "{} buckets checked, {} files ({} bytes) present",
        report.buckets_checked, report.files_present, report.bytes_present
    );
    for key in &report.missing {
        warn!("missing: {}", key);
    }
    for problem in &report.problems {
        warn!("{}", problem);
    }
    if !report.ok() {
        bail!(
            "backup at {} failed verification: {} missing files, {} problems",
            cfg.backup_dir.display(),
            report.missing.len(),
            report.problems.len()
        );
    }
    info!("backup verified");
    Ok(())
}
