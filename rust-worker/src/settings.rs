//! Persisted key/value settings with optional expiry.
//!
//! Holds the runtime-mutable configuration the dispatcher reads at the
//! start of every tick and may write back at the end: the adaptive batch
//! size, the reputation counters and the TTL-bounded gate timestamp.
//! Each key is written individually; there is no cross-key transaction.

use sqlx::{Row, SqlitePool};

use crate::batch::{MAX_BATCH_SIZE, MIN_BATCH_SIZE};

/// Persisted base batch size, auto-decreased by the feedback loop.
pub const BATCH_SIZE_KEY: &str = "email_batch_size";

/// Cumulative successful send counter.
pub const REPUTATION_SENT_KEY: &str = "reputation_sent_count";

/// Cumulative failed send counter.
pub const REPUTATION_FAILED_KEY: &str = "reputation_failed_count";

/// Epoch seconds of the last reputation counter reset.
pub const REPUTATION_RESET_KEY: &str = "reputation_last_reset";

/// Epoch seconds of the last completed dispatch tick (TTL-bounded).
pub const LAST_BATCH_KEY: &str = "last_batch_time";

/// Key/value settings store backed by SQLite.
#[derive(Debug, Clone)]
pub struct SettingsStore {
    pool: SqlitePool,
}

impl SettingsStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Read a raw value, honoring expiry: rows whose `expires_at` has
    /// passed read as absent.
    pub async fn get_raw(&self, key: &str, now: i64) -> Result<Option<String>, sqlx::Error> {
        let row = sqlx::query(
            "SELECT value, expires_at FROM settings WHERE key = ?",
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.and_then(|row| {
            let expires_at: Option<i64> = row.get("expires_at");
            match expires_at {
                Some(expiry) if expiry <= now => None,
                _ => Some(row.get("value")),
            }
        }))
    }

    /// Write a value with no expiry.
    pub async fn put_raw(&self, key: &str, value: &str) -> Result<(), sqlx::Error> {
        self.put_with_expiry(key, value, None).await
    }

    /// Write a value with an optional absolute expiry timestamp.
    pub async fn put_with_expiry(
        &self,
        key: &str,
        value: &str,
        expires_at: Option<i64>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO settings (key, value, expires_at) VALUES (?, ?, ?)
             ON CONFLICT (key) DO UPDATE
             SET value = excluded.value, expires_at = excluded.expires_at",
        )
        .bind(key)
        .bind(value)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_i64(&self, key: &str, now: i64) -> Result<Option<i64>, sqlx::Error> {
        Ok(self
            .get_raw(key, now)
            .await?
            .and_then(|v| v.parse::<i64>().ok()))
    }

    pub async fn put_i64(&self, key: &str, value: i64) -> Result<(), sqlx::Error> {
        self.put_raw(key, &value.to_string()).await
    }

    /// Current base batch size, clamped to the configured bounds.
    pub async fn batch_size(&self, default: i64, now: i64) -> Result<i64, sqlx::Error> {
        let stored = self.get_i64(BATCH_SIZE_KEY, now).await?;
        Ok(stored.unwrap_or(default).clamp(MIN_BATCH_SIZE, MAX_BATCH_SIZE))
    }

    pub async fn set_batch_size(&self, value: i64) -> Result<(), sqlx::Error> {
        self.put_i64(BATCH_SIZE_KEY, value.clamp(MIN_BATCH_SIZE, MAX_BATCH_SIZE))
            .await
    }
}
