//! Producer-side queueing: campaign fan-out and the manual send action.
//!
//! Producers own per-campaign deduplication; the queue itself never
//! deduplicates. A campaign key is claimed exactly once, so republishing
//! the same notification does not enqueue a second wave.

use sqlx::SqlitePool;
use thiserror::Error;
use tracing::info;

use crate::activity::{ActivityLog, EventKind};
use crate::db;
use crate::queue::{NewMessage, QueueStore};
use crate::util::is_valid_email;

/// Caller-visible failures of the producer path.
///
/// The manual send action is the one synchronous error path in the
/// system; everything downstream of the queue is fire-and-forget.
#[derive(Debug, Error)]
pub enum EnqueueError {
    #[error("queue storage has not been provisioned")]
    StorageUnavailable,

    #[error("no recipients supplied")]
    NoRecipients,

    #[error("campaign '{0}' was already queued")]
    DuplicateCampaign(String),

    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),
}

/// Structured result of a campaign fan-out.
#[derive(Debug, Clone)]
pub struct CampaignOutcome {
    /// Recipients actually enqueued
    pub queued: u32,
    /// Recipients skipped for invalid address syntax
    pub skipped: u32,
    /// Human-readable summary for the invoker
    pub message: String,
}

/// Claims campaign keys so each logical notification is queued once.
#[derive(Debug, Clone)]
pub struct CampaignMarkers {
    pool: SqlitePool,
}

impl CampaignMarkers {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Claim a key; false means it was already claimed.
    pub async fn try_claim(&self, key: &str, now: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO campaigns (campaign_key, queued_at) VALUES (?, ?)",
        )
        .bind(key)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

/// Fan one rendered message out to a recipient list.
///
/// Recipients with invalid syntax are skipped up front (they would only
/// be dropped at dispatch time anyway). Each enqueued recipient gets an
/// activity entry of the given kind.
#[allow(clippy::too_many_arguments)]
pub async fn queue_campaign(
    pool: &SqlitePool,
    subject: &str,
    body: &str,
    recipients: &[String],
    campaign_key: Option<&str>,
    kind: EventKind,
    send_at: Option<i64>,
    now: i64,
) -> Result<CampaignOutcome, EnqueueError> {
    if !db::is_provisioned(pool).await {
        return Err(EnqueueError::StorageUnavailable);
    }
    if recipients.is_empty() {
        return Err(EnqueueError::NoRecipients);
    }

    if let Some(key) = campaign_key {
        let markers = CampaignMarkers::new(pool.clone());
        if !markers.try_claim(key, now).await? {
            return Err(EnqueueError::DuplicateCampaign(key.to_string()));
        }
    }

    let queue = QueueStore::new(pool.clone());
    let activity = ActivityLog::new(pool.clone());

    let mut queued = 0u32;
    let mut skipped = 0u32;

    for recipient in recipients {
        if !is_valid_email(recipient) {
            skipped += 1;
            continue;
        }

        let mut message = NewMessage::new(recipient.clone(), subject, body);
        message.send_at = send_at;
        queue.enqueue(&message, now).await?;
        activity
            .record(recipient, kind, &format!("Queued: {}", subject), now)
            .await?;
        queued += 1;
    }

    info!(
        queued = queued,
        skipped = skipped,
        campaign_key = campaign_key.unwrap_or("-"),
        "campaign_queued"
    );

    Ok(CampaignOutcome {
        queued,
        skipped,
        message: format!("Newsletter queued for {} recipients", queued),
    })
}
