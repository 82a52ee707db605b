//! Backup and restore for Supabase Storage buckets.
//!
//! The binary in `main.rs` is a thin wrapper; everything it runs lives here so
//! integration tests can drive the same services against a local server.

pub mod commands;
pub mod config;
pub mod errors;
pub mod models;
pub mod services;
