use super::{connect, dump::dump};
use crate::{
    config::AppConfig,
    services::{backup_service::BackupService, report::log_export_summary},
};
use anyhow::{Context, Result};
use tracing::info;

/// Back up storage (and optionally the database) into `cfg.backup_dir`.
///
/// Per-object failures are logged and recorded but do not fail the command.
pub async fn backup(cfg: &AppConfig, buckets: &[String], with_database: bool) -> Result<()> {
    let (store, remote) = connect(cfg)?;

    if with_database {
        let dumps = dump(cfg).await?;
        info!("{} database dumps written", dumps.len());
    }

    let service = BackupService::new(store, cfg.list_options(), &cfg.backup_dir);
    let summary = service
        .run(&remote.project_id, &remote.url, buckets)
        .await
        .with_context(|| format!("storage backup into {}", cfg.backup_dir.display()))?;
    log_export_summary(&summary);
    Ok(())
}
