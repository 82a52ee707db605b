//! Pipeline components: the store seam and its implementations, the lister,
//! the two transfer directions, and the supporting artifact/report helpers.

pub mod backup_service;
pub mod content_type;
pub mod database;
pub mod keys;
pub mod lister;
pub mod memory_store;
pub mod preflight;
pub mod report;
pub mod restore_service;
pub mod store;
pub mod supabase_store;
pub mod verify;
