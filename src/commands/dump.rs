use crate::{config::AppConfig, services::database::DatabaseDumper};
use anyhow::{Context, Result};
use chrono::Utc;
use std::path::PathBuf;

/// Schema, data, and role dumps under `<backup_dir>/database/`.
pub async fn dump(cfg: &AppConfig) -> Result<Vec<PathBuf>> {
    let dumper = DatabaseDumper::new(&cfg.supabase_cli, cfg.db_url.clone(), &cfg.backup_dir)
        .context("database dump")?;
    let written = dumper
        .dump_all(Utc::now())
        .await
        .context("database dump")?;
    for path in &written {
        tracing::info!("wrote {}", path.display());
    }
    Ok(written)
}
