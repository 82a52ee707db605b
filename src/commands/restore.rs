use super::connect;
use crate::{
    config::AppConfig,
    services::{report::log_restore_summary, restore_service::RestoreService},
};
use anyhow::{Context, Result};

pub async fn restore(cfg: &AppConfig, buckets: &[String]) -> Result<()> {
    let (store, remote) = connect(cfg)?;
    let service = RestoreService::new(store, &cfg.backup_dir);
    let summary = service
        .run(&remote.project_id, &remote.url, buckets)
        .await
        .with_context(|| format!("storage restore from {}", cfg.backup_dir.display()))?;
    log_restore_summary(&summary);
    Ok(())
}
