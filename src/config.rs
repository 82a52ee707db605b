use crate::services::{
    lister::{DEFAULT_MAX_DEPTH, DEFAULT_PAGE_SIZE, ListOptions, MAX_PAGE_SIZE},
    supabase_store::DEFAULT_TIMEOUT,
};
use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use std::{env, fmt, path::PathBuf, str::FromStr, time::Duration};

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Clone)]
pub struct AppConfig {
    pub url: Option<String>,
    pub service_key: Option<String>,
    pub project_id: Option<String>,
    pub backup_dir: PathBuf,
    pub page_size: usize,
    pub max_depth: usize,
    pub timeout: Duration,
    pub db_url: Option<String>,
    pub supabase_cli: String,
}

/// Connection details required by every command that talks to the store.
#[derive(Clone, PartialEq, Eq)]
pub struct RemoteConfig {
    pub url: String,
    pub service_key: String,
    pub project_id: String,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Backup and restore for Supabase Storage buckets"
)]
pub struct Args {
    /// Project URL (overrides SUPABASE_URL)
    #[arg(long, global = true)]
    pub url: Option<String>,

    /// Service role key (overrides SUPABASE_SERVICE_ROLE_KEY)
    #[arg(long, global = true)]
    pub key: Option<String>,

    /// Project identifier for summaries (overrides SUPABASE_PROJECT_ID)
    #[arg(long, global = true)]
    pub project_id: Option<String>,

    /// Entries per listing request, 1-1000 (overrides HARAKKA_PAGE_SIZE)
    #[arg(long, global = true)]
    pub page_size: Option<usize>,

    /// Deepest folder nesting to follow (overrides HARAKKA_MAX_DEPTH)
    #[arg(long, global = true)]
    pub max_depth: Option<usize>,

    /// Per-request timeout in seconds (overrides HARAKKA_TIMEOUT_SECS)
    #[arg(long, global = true)]
    pub timeout_secs: Option<u64>,

    /// Postgres connection string for dumps (overrides SUPABASE_DB_URL)
    #[arg(long, global = true)]
    pub db_url: Option<String>,

    /// Supabase CLI executable (overrides SUPABASE_CLI)
    #[arg(long, global = true)]
    pub supabase_cli: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Download every bucket into a local backup tree
    Backup {
        /// Backup directory (overrides HARAKKA_BACKUP_DIR)
        #[arg(long)]
        out: Option<PathBuf>,
        /// Only back up this bucket (repeatable)
        #[arg(long = "bucket")]
        buckets: Vec<String>,
        /// Also dump schema, data and roles with the Supabase CLI
        #[arg(long)]
        with_database: bool,
    },
    /// Re-create buckets and upload files from a backup tree
    Restore {
        /// Backup directory (overrides HARAKKA_BACKUP_DIR)
        #[arg(long)]
        from: Option<PathBuf>,
        /// Only restore this bucket (repeatable)
        #[arg(long = "bucket")]
        buckets: Vec<String>,
    },
    /// Check a backup tree against its manifests without contacting the store
    Verify {
        #[arg(long)]
        from: Option<PathBuf>,
    },
    /// Dump the database only
    Dump {
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Check store credentials and backup directory access
    Check {
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

impl Command {
    /// Directory override given on the command line, if any.
    fn dir_override(&self) -> Option<&PathBuf> {
        match self {
            Command::Backup { out, .. } | Command::Dump { out } | Command::Check { out } => {
                out.as_ref()
            }
            Command::Restore { from, .. } | Command::Verify { from } => from.as_ref(),
        }
    }
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and the command.
    pub fn from_env_and_args() -> Result<(Self, Command)> {
        let args = Args::parse();
        Self::resolve(args, |name| env::var(name).ok())
    }

    /// Merge parsed `args` over values looked up through `env`.
    pub fn resolve(args: Args, env: impl Fn(&str) -> Option<String>) -> Result<(Self, Command)> {
        let env_page_size = parse_env(&env, "HARAKKA_PAGE_SIZE")?.unwrap_or(DEFAULT_PAGE_SIZE);
        let env_max_depth = parse_env(&env, "HARAKKA_MAX_DEPTH")?.unwrap_or(DEFAULT_MAX_DEPTH);
        let env_timeout = parse_env(&env, "HARAKKA_TIMEOUT_SECS")?.unwrap_or(DEFAULT_TIMEOUT.as_secs());
        let env_backup_dir = env("HARAKKA_BACKUP_DIR").unwrap_or_else(|| "./backups".into());

        let page_size = args.page_size.unwrap_or(env_page_size);
        if page_size == 0 {
            bail!("page size must be at least 1");
        }
        let timeout_secs = args.timeout_secs.unwrap_or(env_timeout);
        if timeout_secs == 0 {
            bail!("timeout must be at least 1 second");
        }

        let cfg = Self {
            url: args.url.or_else(|| env("SUPABASE_URL")).filter(|v| !v.is_empty()),
            service_key: args
                .key
                .or_else(|| env("SUPABASE_SERVICE_ROLE_KEY"))
                .filter(|v| !v.is_empty()),
            project_id: args.project_id.or_else(|| env("SUPABASE_PROJECT_ID")),
            backup_dir: args
                .command
                .dir_override()
                .cloned()
                .unwrap_or_else(|| PathBuf::from(env_backup_dir)),
            page_size: page_size.min(MAX_PAGE_SIZE),
            max_depth: args.max_depth.unwrap_or(env_max_depth),
            timeout: Duration::from_secs(timeout_secs),
            db_url: args.db_url.or_else(|| env("SUPABASE_DB_URL")),
            supabase_cli: args
                .supabase_cli
                .or_else(|| env("SUPABASE_CLI"))
                .unwrap_or_else(|| "supabase".into()),
        };

        Ok((cfg, args.command))
    }

    pub fn list_options(&self) -> ListOptions {
        ListOptions {
            page_size: self.page_size,
            max_depth: self.max_depth,
        }
    }

    /// URL, key, and project id, or an error naming what is missing.
    pub fn remote(&self) -> Result<RemoteConfig> {
        let url = self
            .url
            .clone()
            .context("no project URL configured (set SUPABASE_URL or pass --url)")?;
        let service_key = self
            .service_key
            .clone()
            .context("no service key configured (set SUPABASE_SERVICE_ROLE_KEY or pass --key)")?;
        let project_id = match &self.project_id {
            Some(id) => id.clone(),
            None => project_id_from_url(&url)
                .with_context(|| format!("cannot derive a project id from `{}`", url))?,
        };
        Ok(RemoteConfig {
            url,
            service_key,
            project_id,
        })
    }
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("url", &self.url)
            .field(
                "service_key",
                &self.service_key.as_ref().map(|_| "<redacted>"),
            )
            .field("project_id", &self.project_id)
            .field("backup_dir", &self.backup_dir)
            .field("page_size", &self.page_size)
            .field("max_depth", &self.max_depth)
            .field("timeout", &self.timeout)
            .field("db_url", &self.db_url.as_ref().map(|_| "<redacted>"))
            .field("supabase_cli", &self.supabase_cli)
            .finish()
    }
}

impl fmt::Debug for RemoteConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteConfig")
            .field("url", &self.url)
            .field("service_key", &"<redacted>")
            .field("project_id", &self.project_id)
            .finish()
    }
}

fn parse_env<T>(env: &impl Fn(&str) -> Option<String>, name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env(name) {
        Some(value) => value
            .parse::<T>()
            .map(Some)
            .with_context(|| format!("parsing {} value `{}`", name, value)),
        None => Ok(None),
    }
}

/// First host label of the project URL (`https://abc.supabase.co` → `abc`).
pub fn project_id_from_url(url: &str) -> Option<String> {
    let without_scheme = url.split_once("://").map_or(url, |(_, rest)| rest);
    let host = without_scheme
        .split(['/', ':', '?'])
        .next()
        .filter(|h| !h.is_empty())?;
    host.split('.').next().map(str::to_string)
}
