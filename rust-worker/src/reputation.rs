//! Sender reputation tracking.
//!
//! Cumulative success/failure counters with a derived score in `[0, 1]`.
//! The score feeds the batch size controller: poor reputation shrinks the
//! per-tick quota, excellent reputation relaxes it. Counters are lifetime
//! values; `reset` is an explicit operator action, never automatic.

use sqlx::SqlitePool;
use tracing::warn;

use crate::settings::{
    SettingsStore, REPUTATION_FAILED_KEY, REPUTATION_RESET_KEY, REPUTATION_SENT_KEY,
};

/// Snapshot of the persisted reputation counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReputationStats {
    pub sent_count: i64,
    pub failed_count: i64,
    /// Epoch seconds of the last explicit counter reset
    pub last_reset: i64,
}

impl ReputationStats {
    /// Ratio of successful to total attempted sends.
    ///
    /// Defined as 1.0 when nothing has been attempted yet, so a fresh
    /// deployment starts with full quota headroom.
    pub fn score(&self) -> f64 {
        let total = self.sent_count + self.failed_count;
        if total == 0 {
            return 1.0;
        }
        self.sent_count as f64 / total as f64
    }
}

/// Persisted send/fail counters with a derived deliverability score.
#[derive(Debug, Clone)]
pub struct ReputationTracker {
    settings: SettingsStore,
}

impl ReputationTracker {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            settings: SettingsStore::new(pool),
        }
    }

    /// Load the current counters.
    pub async fn stats(&self, now: i64) -> Result<ReputationStats, sqlx::Error> {
        Ok(ReputationStats {
            sent_count: self
                .settings
                .get_i64(REPUTATION_SENT_KEY, now)
                .await?
                .unwrap_or(0),
            failed_count: self
                .settings
                .get_i64(REPUTATION_FAILED_KEY, now)
                .await?
                .unwrap_or(0),
            last_reset: self
                .settings
                .get_i64(REPUTATION_RESET_KEY, now)
                .await?
                .unwrap_or(0),
        })
    }

    /// Record a successful send.
    pub async fn record_success(&self, now: i64) -> Result<(), sqlx::Error> {
        let current = self
            .settings
            .get_i64(REPUTATION_SENT_KEY, now)
            .await?
            .unwrap_or(0);
        self.settings
            .put_i64(REPUTATION_SENT_KEY, current + 1)
            .await
    }

    /// Record a failed send with a diagnostic reason.
    pub async fn record_failure(&self, now: i64, reason: &str) -> Result<(), sqlx::Error> {
        warn!(reason = reason, "email_send_failure_recorded");
        let current = self
            .settings
            .get_i64(REPUTATION_FAILED_KEY, now)
            .await?
            .unwrap_or(0);
        self.settings
            .put_i64(REPUTATION_FAILED_KEY, current + 1)
            .await
    }

    /// Zero both counters and stamp the reset time.
    pub async fn reset(&self, now: i64) -> Result<(), sqlx::Error> {
        self.settings.put_i64(REPUTATION_SENT_KEY, 0).await?;
        self.settings.put_i64(REPUTATION_FAILED_KEY, 0).await?;
        self.settings.put_i64(REPUTATION_RESET_KEY, now).await
    }
}
