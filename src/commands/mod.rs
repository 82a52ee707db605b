//! One function per subcommand. Commands own the anyhow boundary: services
//! return typed errors and commands attach context before `main` reports them.

mod backup;
mod check;
mod dump;
mod restore;
mod verify;

use crate::{
    config::{AppConfig, Command, RemoteConfig},
    services::{store::ObjectStore, supabase_store::SupabaseStore},
};
use anyhow::{Context, Result};
use std::sync::Arc;

pub use backup::backup;
pub use check::check;
pub use dump::dump;
pub use restore::restore;
pub use verify::verify;

/// Dispatch a parsed command.
pub async fn run(cfg: &AppConfig, command: Command) -> Result<()> {
    match command {
        Command::Backup {
            buckets,
            with_database,
            ..
        } => backup(cfg, &buckets, with_database).await,
        Command::Restore { buckets, .. } => restore(cfg, &buckets).await,
        Command::Verify { .. } => verify(cfg).await,
        Command::Dump { .. } => dump(cfg).await.map(|_| ()),
        Command::Check { .. } => check(cfg).await,
    }
}

/// Build the HTTP store from the configured URL and key.
pub(crate) fn connect(cfg: &AppConfig) -> Result<(Arc<dyn ObjectStore>, RemoteConfig)> {
    let remote = cfg.remote()?;
    let store = SupabaseStore::builder(&remote.url, &remote.service_key)
        .timeout(cfg.timeout)
        .build()
        .context("building storage client")?;
    tracing::debug!("connected to {}", store.base_url());
    Ok((Arc::new(store), remote))
}
