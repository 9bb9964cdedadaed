//! Dispatch gate: minimum wall-clock spacing between ticks.
//!
//! The stored timestamp carries a one-hour lifetime so a stalled
//! scheduler cannot wedge the gate shut forever. No lock is taken;
//! non-overlapping tick invocations are the scheduler's contract.

use sqlx::SqlitePool;
use tracing::debug;

use crate::settings::{SettingsStore, LAST_BATCH_KEY};

/// Lifetime of the stored gate timestamp, in seconds.
pub const GATE_TTL_SECS: i64 = 3_600;

/// Minimum-interval gate between dispatcher ticks.
#[derive(Debug, Clone)]
pub struct DispatchGate {
    settings: SettingsStore,
    interval_minutes: u32,
}

impl DispatchGate {
    pub fn new(pool: SqlitePool, interval_minutes: u32) -> Self {
        Self {
            settings: SettingsStore::new(pool),
            interval_minutes,
        }
    }

    /// Whether a tick may proceed at `now` (epoch seconds).
    pub async fn check(&self, now: i64) -> Result<bool, sqlx::Error> {
        let last = self.settings.get_i64(LAST_BATCH_KEY, now).await?;
        let min_interval = i64::from(self.interval_minutes) * 60;

        let clear = match last {
            Some(last_batch_time) => now - last_batch_time >= min_interval,
            None => true,
        };

        if !clear {
            debug!(
                last_batch_time = last,
                min_interval_secs = min_interval,
                "dispatch_gate_closed"
            );
        }
        Ok(clear)
    }

    /// Record a completed tick at `now`, with the bounded lifetime.
    pub async fn record(&self, now: i64) -> Result<(), sqlx::Error> {
        self.settings
            .put_with_expiry(LAST_BATCH_KEY, &now.to_string(), Some(now + GATE_TTL_SECS))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    async fn gate(interval_minutes: u32) -> DispatchGate {
        let pool = db::connect("sqlite::memory:").await.unwrap();
        db::run_migrations(&pool).await.unwrap();
        DispatchGate::new(pool, interval_minutes)
    }

    #[tokio::test]
    async fn test_gate_clear_when_never_run() {
        let gate = gate(5).await;
        assert!(gate.check(1_000).await.unwrap());
    }

    #[tokio::test]
    async fn test_gate_blocks_within_interval() {
        let gate = gate(5).await;
        gate.record(1_000).await.unwrap();

        assert!(!gate.check(1_000 + 299).await.unwrap());
        assert!(gate.check(1_000 + 300).await.unwrap());
    }

    #[tokio::test]
    async fn test_gate_timestamp_expires() {
        let gate = gate(120).await;
        gate.record(1_000).await.unwrap();

        // Interval is two hours, but the stored timestamp only lives one:
        // a stalled scheduler cannot wedge the gate shut.
        assert!(!gate.check(1_000 + 3_599).await.unwrap());
        assert!(gate.check(1_000 + GATE_TTL_SECS).await.unwrap());
    }

    #[tokio::test]
    async fn test_zero_interval_always_clear() {
        let gate = gate(0).await;
        gate.record(1_000).await.unwrap();
        assert!(gate.check(1_000).await.unwrap());
    }
}
