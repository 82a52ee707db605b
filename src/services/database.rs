//! Database dumps through the external Supabase CLI.
//!
//! Produces `<root>/database/{schema,data,roles}_<timestamp>.sql`. Unlike the
//! storage tree these names carry the run's start time, so repeated runs keep
//! earlier dumps.

use crate::errors::DumpError;
use chrono::{DateTime, Utc};
use std::{
    fmt,
    path::{Path, PathBuf},
};
use tokio::{fs, process::Command};
use tracing::info;

pub const DATABASE_DIR: &str = "database";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DumpKind {
    Schema,
    Data,
    Roles,
}

impl DumpKind {
    pub const ALL: [DumpKind; 3] = [DumpKind::Schema, DumpKind::Data, DumpKind::Roles];

    pub fn name(self) -> &'static str {
        match self {
            DumpKind::Schema => "schema",
            DumpKind::Data => "data",
            DumpKind::Roles => "roles",
        }
    }

    fn extra_flag(self) -> Option<&'static str> {
        match self {
            DumpKind::Schema => None,
            DumpKind::Data => Some("--data-only"),
            DumpKind::Roles => Some("--role-only"),
        }
    }
}

/// Filename-safe rendering of a run's start time.
pub fn run_timestamp(started: DateTime<Utc>) -> String {
    started.format("%Y-%m-%dT%H-%M-%SZ").to_string()
}

#[derive(Clone)]
pub struct DatabaseDumper {
    /// Supabase CLI executable.
    pub program: String,
    db_url: String,
    out_dir: PathBuf,
}

impl fmt::Debug for DatabaseDumper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseDumper")
            .field("program", &self.program)
            .field("out_dir", &self.out_dir)
            .finish_non_exhaustive()
    }
}

impl DatabaseDumper {
    pub fn new(program: impl Into<String>, db_url: Option<String>, root: &Path) -> Result<Self, DumpError> {
        let db_url = db_url
            .filter(|url| !url.trim().is_empty())
            .ok_or(DumpError::MissingDatabaseUrl)?;
        Ok(Self {
            program: program.into(),
            db_url,
            out_dir: root.join(DATABASE_DIR),
        })
    }

    pub fn dump_path(&self, kind: DumpKind, timestamp: &str) -> PathBuf {
        self.out_dir.join(format!("{}_{}.sql", kind.name(), timestamp))
    }

    /// CLI arguments for one dump. The database URL is passed verbatim.
    pub fn args(&self, kind: DumpKind, file: &Path) -> Vec<String> {
        let mut args = vec![
            "db".to_string(),
            "dump".to_string(),
            "--db-url".to_string(),
            self.db_url.clone(),
            "-f".to_string(),
            file.display().to_string(),
        ];
        if let Some(flag) = kind.extra_flag() {
            args.push(flag.to_string());
        }
        args
    }

    /// Run schema, data, and role dumps in sequence; the first failure stops.
    pub async fn dump_all(&self, started: DateTime<Utc>) -> Result<Vec<PathBuf>, DumpError> {
        fs::create_dir_all(&self.out_dir).await?;
        let timestamp = run_timestamp(started);
        let mut written = Vec::with_capacity(DumpKind::ALL.len());
        for kind in DumpKind::ALL {
            let path = self.dump_path(kind, &timestamp);
            self.dump(kind, &path).await?;
            written.push(path);
        }
        Ok(written)
    }

    pub async fn dump(&self, kind: DumpKind, file: &Path) -> Result<(), DumpError> {
        info!("dumping {} to {}", kind.name(), file.display());
        let args = self.args(kind, file);
        let output = Command::new(&self.program)
            .args(&args)
            .output()
            .await
            .map_err(|source| DumpError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if !output.status.success() {
            // keep the connection string out of error messages
            let shown: Vec<&str> = args
                .iter()
                .map(|a| if *a == self.db_url { "<db-url>" } else { a.as_str() })
                .collect();
            return Err(DumpError::Failed {
                program: self.program.clone(),
                args: shown.join(" "),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(())
    }
}
