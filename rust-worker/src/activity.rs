//! Append-only email activity log.
//!
//! The scheduled send path is fire-and-forget; this log and the
//! reputation counters are its only observable outputs.

use sqlx::{Row, SqlitePool};
use tracing::debug;

/// Kind of logged email activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// Message handed to the transport successfully
    SentViaQueue,
    /// Transport reported failure; row still marked sent (no retry)
    FailedViaQueue,
    /// Recipient failed syntax validation; transport never invoked
    DroppedInvalid,
    /// Message queued through the manual send action
    ManualSendQueued,
    /// Message queued through an automated campaign producer
    CampaignQueued,
    /// Asynchronous delivery confirmation from the transport provider
    DeliveryEvent,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::SentViaQueue => "sent_via_queue",
            EventKind::FailedViaQueue => "failed_via_queue",
            EventKind::DroppedInvalid => "dropped_invalid",
            EventKind::ManualSendQueued => "manual_send_queued",
            EventKind::CampaignQueued => "campaign_queued",
            EventKind::DeliveryEvent => "delivery_event",
        }
    }
}

/// One row of the activity log.
#[derive(Debug, Clone)]
pub struct ActivityRecord {
    pub ts: i64,
    pub recipient: String,
    pub event: String,
    pub detail: String,
}

/// Append-only sink for email activity.
#[derive(Debug, Clone)]
pub struct ActivityLog {
    pool: SqlitePool,
}

impl ActivityLog {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Append one entry.
    pub async fn record(
        &self,
        recipient: &str,
        kind: EventKind,
        detail: &str,
        now: i64,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO activity_log (ts, recipient, event, detail) VALUES (?, ?, ?, ?)",
        )
        .bind(now)
        .bind(recipient)
        .bind(kind.as_str())
        .bind(detail)
        .execute(&self.pool)
        .await?;

        debug!(recipient = recipient, event = kind.as_str(), "activity_recorded");
        Ok(())
    }

    /// Most recent entries, newest first.
    pub async fn recent(&self, limit: i64) -> Result<Vec<ActivityRecord>, sqlx::Error> {
        let rows = sqlx::query(
            "SELECT ts, recipient, event, detail FROM activity_log
             ORDER BY id DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| ActivityRecord {
                ts: row.get("ts"),
                recipient: row.get("recipient"),
                event: row.get("event"),
                detail: row.get("detail"),
            })
            .collect())
    }

    /// Total number of entries.
    pub async fn count(&self) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM activity_log")
            .fetch_one(&self.pool)
            .await
    }
}
