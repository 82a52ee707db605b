//! Error types shared by the store client, the lister, and the transfer engine.
//!
//! Each layer has its own enum so callers can decide where an error stops:
//! transfer errors stay inside a per-object result, list errors stop a bucket,
//! and only top-level failures reach the process exit code.

use std::{io, path::PathBuf};
use thiserror::Error;

/// Failures reported by an [`ObjectStore`](crate::services::store::ObjectStore) implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("bucket `{0}` not found")]
    BucketNotFound(String),
    #[error("object `{key}` not found in bucket `{bucket}`")]
    ObjectNotFound { bucket: String, key: String },
    #[error("`{0}` already exists")]
    AlreadyExists(String),
    #[error("store returned {status}: {message}")]
    Status { status: u16, message: String },
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected response body: {0}")]
    Decode(String),
    #[error("injected failure: {0}")]
    Injected(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Enumeration failures, at bucket level or while walking a bucket's keys.
#[derive(Debug, Error)]
pub enum ListError {
    #[error("listing buckets failed: {source}")]
    Buckets {
        #[source]
        source: StoreError,
    },
    #[error("listing `{bucket}` at prefix `{prefix}` failed: {source}")]
    Objects {
        bucket: String,
        prefix: String,
        #[source]
        source: StoreError,
    },
    #[error("folder nesting in `{bucket}` exceeds {max_depth} levels at prefix `{prefix}`")]
    DepthExceeded {
        bucket: String,
        prefix: String,
        max_depth: usize,
    },
}

/// A single object's download or upload failed.
#[derive(Debug, Error)]
pub enum TransferError {
    #[error("bucket name `{0}` is not a single safe directory name")]
    UnsafeBucketName(String),
    #[error("object key `{0}` is not safe to map onto the local filesystem")]
    UnsafeKey(String),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Reading or writing a JSON artifact failed.
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("reading {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("writing {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("parsing {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("encoding {path}: {source}")]
    Encode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Database dump failures.
#[derive(Debug, Error)]
pub enum DumpError {
    #[error("no database URL configured (set SUPABASE_DB_URL or pass --db-url)")]
    MissingDatabaseUrl,
    #[error("could not launch `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("`{program} {args}` exited with {status}: {stderr}")]
    Failed {
        program: String,
        args: String,
        status: String,
        stderr: String,
    },
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Failures that end a whole backup or restore run.
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    List(#[from] ListError),
    #[error(transparent)]
    Manifest(#[from] ManifestError),
    #[error("reading backup directory {path}: {source}")]
    BackupDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}
