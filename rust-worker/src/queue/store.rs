//! Queue data access.

use sqlx::{Row, SqlitePool};
use tracing::debug;

use super::types::{NewMessage, QueueMessage};

/// Data access for the durable email queue.
///
/// All writes are individual row updates; a crash mid-batch leaves some
/// rows sent and others pending, which is the intended at-most-once
/// semantics.
#[derive(Debug, Clone)]
pub struct QueueStore {
    pool: SqlitePool,
}

impl QueueStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a pending message and return its assigned id.
    ///
    /// The queue does not deduplicate; producers own per-campaign dedup.
    pub async fn enqueue(&self, message: &NewMessage, now: i64) -> Result<i64, sqlx::Error> {
        let headers_json = if message.headers.is_empty() {
            None
        } else {
            serde_json::to_string(&message.headers).ok()
        };

        let result = sqlx::query(
            "INSERT INTO email_queue (recipient, subject, body, headers_json, send_at, sent)
             VALUES (?, ?, ?, ?, ?, 0)",
        )
        .bind(&message.recipient)
        .bind(&message.subject)
        .bind(&message.body)
        .bind(headers_json)
        .bind(message.send_at.unwrap_or(now))
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// Fetch up to `limit` eligible rows, oldest first.
    pub async fn fetch_eligible(
        &self,
        now: i64,
        limit: i64,
    ) -> Result<Vec<QueueMessage>, sqlx::Error> {
        let rows = sqlx::query(
            "SELECT id, recipient, subject, body, headers_json, send_at, sent, sent_at
             FROM email_queue
             WHERE send_at <= ? AND sent = 0
             ORDER BY id ASC
             LIMIT ?",
        )
        .bind(now)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        let messages: Vec<QueueMessage> = rows.iter().map(row_to_message).collect();
        debug!(count = messages.len(), "queue_fetch_complete");
        Ok(messages)
    }

    /// Mark a row sent, recording the timestamp.
    ///
    /// Guarded on `sent = 0` so repeated calls leave the row untouched and
    /// `sent_at` is written exactly once. Called whether or not
    /// transmission succeeded.
    pub async fn mark_sent(&self, id: i64, sent_at: i64) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE email_queue SET sent = 1, sent_at = ? WHERE id = ? AND sent = 0",
        )
        .bind(sent_at)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Number of rows currently eligible for dispatch.
    pub async fn pending_count(&self, now: i64) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT COUNT(*) FROM email_queue WHERE send_at <= ? AND sent = 0",
        )
        .bind(now)
        .fetch_one(&self.pool)
        .await
    }

    /// Fetch a single row by id.
    pub async fn get(&self, id: i64) -> Result<Option<QueueMessage>, sqlx::Error> {
        let row = sqlx::query(
            "SELECT id, recipient, subject, body, headers_json, send_at, sent, sent_at
             FROM email_queue WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(row_to_message))
    }
}

fn row_to_message(row: &sqlx::sqlite::SqliteRow) -> QueueMessage {
    let headers_json: Option<String> = row.get("headers_json");
    let headers = headers_json
        .as_deref()
        .and_then(|json| serde_json::from_str(json).ok())
        .unwrap_or_default();

    QueueMessage {
        id: row.get("id"),
        recipient: row.get("recipient"),
        subject: row.get("subject"),
        body: row.get("body"),
        headers,
        send_at: row.get("send_at"),
        sent: row.get::<i64, _>("sent") != 0,
        sent_at: row.get("sent_at"),
    }
}
