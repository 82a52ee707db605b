use super::connect;
use crate::{config::AppConfig, services::preflight::run_preflight};
use anyhow::{Result, bail};
use tracing::{error, info};

pub async fn check(cfg: &AppConfig) -> Result<()> {
    let (store, remote) = connect(cfg)?;
    let report = run_preflight(&*store, &cfg.backup_dir).await;

    for (name, status) in [("store", &report.store), ("disk", &report.disk)] {
        if status.ok {
            info!("{:<6} ok    {}", name, status.detail);
        } else {
            error!("{:<6} FAIL  {}", name, status.detail);
        }
    }
    if !report.ok() {
        bail!("preflight failed for project {}", remote.project_id);
    }
    Ok(())
}
