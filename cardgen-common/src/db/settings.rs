//! Settings key/value operations
//!
//! Provides get/set accessors for the `settings` table following the
//! key-value pattern. Anything durable that is not worth its own table
//! (the offline delivery queue, for one) lives here as a string value.

use crate::{Error, Result};
use async_trait::async_trait;
use sqlx::SqlitePool;

/// Flat key → string persistence surface
///
/// Writes must be durable by the time the future resolves.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read a value, `None` when the key was never written
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Insert or replace a value
    async fn set(&self, key: &str, value: &str) -> Result<()>;
}

/// SQLite-backed [`KeyValueStore`] over the `settings` table
#[derive(Clone)]
pub struct SettingsStore {
    db: SqlitePool,
}

impl SettingsStore {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl KeyValueStore for SettingsStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let row: Option<(Option<String>,)> =
            sqlx::query_as("SELECT value FROM settings WHERE key = ?")
                .bind(key)
                .fetch_optional(&self.db)
                .await
                .map_err(Error::Database)?;

        Ok(row.and_then(|(value,)| value))
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            "INSERT INTO settings (key, value, updated_at) VALUES (?, ?, CURRENT_TIMESTAMP)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = CURRENT_TIMESTAMP",
        )
        .bind(key)
        .bind(value)
        .execute(&self.db)
        .await
        .map_err(Error::Database)?;

        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
