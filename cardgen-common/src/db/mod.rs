//! Database access
//!
//! SQLite holds a single flat `settings` table used as the durable key/value
//! surface (the delivery queue is persisted there as one JSON blob).

pub mod init;
pub mod settings;

pub use init::{create_settings_table, init_database, init_in_memory};
pub use settings::{KeyValueStore, SettingsStore};
