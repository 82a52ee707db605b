//! Preflight checks run by `check` before a long backup or restore.
//!
//! 1. The store answers a bucket listing with the configured credentials.
//! 2. A best-effort write/read/delete succeeds under the backup directory.

use super::store::ObjectStore;
use serde::Serialize;
use std::{io, path::Path};
use tokio::fs;
use uuid::Uuid;

const SCRATCH_BYTES: &[u8] = b"harakka preflight";

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct CheckStatus {
    pub ok: bool,
    pub detail: String,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct PreflightReport {
    pub store: CheckStatus,
    pub disk: CheckStatus,
}

impl PreflightReport {
    pub fn ok(&self) -> bool {
        self.store.ok && self.disk.ok
    }
}

pub async fn run_preflight(store: &dyn ObjectStore, backup_dir: &Path) -> PreflightReport {
    PreflightReport {
        store: check_store(store).await,
        disk: check_disk(backup_dir).await,
    }
}

async fn check_store(store: &dyn ObjectStore) -> CheckStatus {
    match store.list_buckets().await {
        Ok(buckets) => CheckStatus {
            ok: true,
            detail: format!("{} buckets visible", buckets.len()),
        },
        Err(e) => CheckStatus {
            ok: false,
            detail: format!("error: {}", e),
        },
    }
}

async fn check_disk(backup_dir: &Path) -> CheckStatus {
    let scratch = backup_dir.join(format!(".preflight-{}", Uuid::new_v4()));
    let outcome = async {
        fs::create_dir_all(backup_dir).await?;
        fs::write(&scratch, SCRATCH_BYTES).await?;
        let read_back = fs::read(&scratch).await;
        let removed = fs::remove_file(&scratch).await;
        if read_back? != SCRATCH_BYTES {
            return Err(io::Error::other("scratch file read back different bytes"));
        }
        removed
    }
    .await;

    match outcome {
        Ok(()) => CheckStatus {
            ok: true,
            detail: format!("{} is writable", backup_dir.display()),
        },
        Err(e) => CheckStatus {
            ok: false,
            detail: format!("{}: {}", backup_dir.display(), e),
        },
    }
}
