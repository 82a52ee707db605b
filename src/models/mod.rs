//! Core data models for the backup pipeline.
//!
//! These entities mirror the remote store's bucket and listing payloads and
//! the JSON artifacts written next to a backup. They serialize naturally via
//! `serde`.

pub mod bucket;
pub mod manifest;
pub mod object;
