//! Dispatcher: one processing tick over the email queue.
//!
//! A tick runs gate check, quota computation, fetch, the per-message
//! pipeline, reputation bookkeeping and the adaptive batch-size shrink,
//! then records the gate timestamp. Ticks must not overlap; the
//! scheduler invokes them serially and the daemon binary runs them from
//! a single loop. Every fetched row ends up marked sent exactly once,
//! whatever the transmission outcome: there are no retries.

use std::sync::Arc;

use chrono::{DateTime, Local, NaiveDate, Timelike, Utc};
use sqlx::SqlitePool;
use tracing::{error, info, warn};

use crate::activity::{ActivityLog, EventKind};
use crate::batch;
use crate::config::Config;
use crate::db;
use crate::deliver::Enhancer;
use crate::gate::DispatchGate;
use crate::queue::{QueueMessage, QueueStore};
use crate::reputation::ReputationTracker;
use crate::settings::SettingsStore;
use crate::throttle::SendPacer;
use crate::transport::Transport;

/// Success-rate threshold below which the persisted base batch size is
/// shrunk after a tick.
const SHRINK_THRESHOLD: f64 = 0.8;

/// Multiplier applied to the base batch size after a bad tick.
const SHRINK_FACTOR: f64 = 0.8;

/// Result of one dispatcher tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// Gate was closed; nothing was fetched or mutated
    RateLimited,
    /// Queue storage is not provisioned; nothing was mutated
    StorageUnavailable,
    /// A full pass ran (possibly over zero rows)
    Completed(TickStats),
}

/// Counters for one completed tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickStats {
    /// Rows fetched for this tick
    pub attempted: u32,
    /// Rows the transport accepted
    pub sent: u32,
    /// Rows dropped as invalid or rejected by the transport
    pub failed: u32,
    /// Quota computed for this tick
    pub quota: i64,
}

/// Orchestrates queue draining with adaptive batch sizing.
#[derive(Clone)]
pub struct Dispatcher {
    pool: SqlitePool,
    queue: QueueStore,
    settings: SettingsStore,
    reputation: ReputationTracker,
    activity: ActivityLog,
    gate: DispatchGate,
    enhancer: Enhancer,
    transport: Arc<dyn Transport>,
    default_batch_size: i64,
}

impl Dispatcher {
    pub fn new(pool: &SqlitePool, config: &Config, transport: Arc<dyn Transport>) -> Self {
        Self {
            pool: pool.clone(),
            queue: QueueStore::new(pool.clone()),
            settings: SettingsStore::new(pool.clone()),
            reputation: ReputationTracker::new(pool.clone()),
            activity: ActivityLog::new(pool.clone()),
            gate: DispatchGate::new(pool.clone(), config.send_interval_minutes),
            enhancer: Enhancer::from_config(config),
            transport,
            default_batch_size: config.default_batch_size,
        }
    }

    /// Run one tick at the given wall-clock time.
    ///
    /// Message-level failures never propagate; `Err` means the storage
    /// layer itself failed mid-tick.
    pub async fn run_tick(&self, now: DateTime<Utc>) -> Result<TickOutcome, sqlx::Error> {
        let ts = now.timestamp();

        if !db::is_provisioned(&self.pool).await {
            info!("tick_skipped_storage_unavailable");
            return Ok(TickOutcome::StorageUnavailable);
        }

        if !self.gate.check(ts).await? {
            info!("tick_skipped_rate_limited");
            return Ok(TickOutcome::RateLimited);
        }

        let base = self.settings.batch_size(self.default_batch_size, ts).await?;
        let score = self.reputation.stats(ts).await?.score();
        let local = now.with_timezone(&Local);
        let quota = batch::compute(base, local.hour(), score);

        let messages = self.queue.fetch_eligible(ts, quota).await?;

        info!(
            quota = quota,
            base_batch_size = base,
            reputation_score = score,
            eligible = messages.len(),
            "tick_started"
        );

        let mut stats = TickStats {
            attempted: messages.len() as u32,
            quota,
            ..TickStats::default()
        };

        let mut pacer = SendPacer::for_queue_pacing();
        let today = local.date_naive();

        for message in messages {
            if self.process_message(message, &mut pacer, ts, today).await {
                stats.sent += 1;
            } else {
                stats.failed += 1;
            }
        }

        self.adaptive_shrink(base, stats, ts).await?;
        self.gate.record(ts).await?;

        info!(
            sent = stats.sent,
            failed = stats.failed,
            "tick_complete"
        );

        Ok(TickOutcome::Completed(stats))
    }

    /// Validate, enhance, send, log and mark one row. Returns success.
    async fn process_message(
        &self,
        message: QueueMessage,
        pacer: &mut SendPacer,
        ts: i64,
        today: NaiveDate,
    ) -> bool {
        let recipient = message.recipient.clone();

        // Invalid addresses are dropped without ever touching the
        // transport, but still count as failures.
        if !crate::util::is_valid_email(&recipient) {
            warn!(id = message.id, recipient = %recipient, "recipient_invalid");
            self.log_activity(&recipient, EventKind::DroppedInvalid, "Invalid recipient address", ts)
                .await;
            self.record_failure(ts, "invalid recipient address").await;
            self.mark_sent(message.id, ts).await;
            return false;
        }

        let headers = if message.has_headers() {
            message.headers.clone()
        } else {
            self.enhancer.headers_for(&recipient, today)
        };

        let body = self.enhancer.enhance_body(&message.body, &recipient);

        pacer.acquire().await;

        let outcome = self
            .transport
            .send(&recipient, &message.subject, &body, &headers)
            .await;

        let success = match outcome {
            Ok(accepted) => accepted,
            Err(e) => {
                error!(id = message.id, recipient = %recipient, error = %e, "transport_error");
                false
            }
        };

        if success {
            self.log_activity(
                &recipient,
                EventKind::SentViaQueue,
                "Email sent successfully via queue",
                ts,
            )
            .await;
            if let Err(e) = self.reputation.record_success(ts).await {
                error!(error = %e, "reputation_update_failed");
            }
        } else {
            self.log_activity(
                &recipient,
                EventKind::FailedViaQueue,
                "Email failed to send via queue",
                ts,
            )
            .await;
            self.record_failure(ts, "transport rejected message").await;
        }

        // Marked sent regardless of outcome: at most one attempt per row
        self.mark_sent(message.id, ts).await;
        success
    }

    /// Shrink the persisted base batch size after a bad tick.
    async fn adaptive_shrink(
        &self,
        base: i64,
        stats: TickStats,
        ts: i64,
    ) -> Result<(), sqlx::Error> {
        let success_rate =
            f64::from(stats.sent) / f64::from(stats.sent + stats.failed + 1);

        if success_rate < SHRINK_THRESHOLD {
            let reduced =
                ((base as f64 * SHRINK_FACTOR) as i64).max(batch::MIN_BATCH_SIZE);
            if reduced < base {
                info!(
                    previous = base,
                    reduced = reduced,
                    success_rate = success_rate,
                    "batch_size_reduced"
                );
                self.settings.set_batch_size(reduced).await?;
            }
        }
        Ok(())
    }

    async fn log_activity(&self, recipient: &str, kind: EventKind, detail: &str, ts: i64) {
        if let Err(e) = self.activity.record(recipient, kind, detail, ts).await {
            error!(recipient = recipient, error = %e, "activity_log_failed");
        }
    }

    async fn record_failure(&self, ts: i64, reason: &str) {
        if let Err(e) = self.reputation.record_failure(ts, reason).await {
            error!(error = %e, "reputation_update_failed");
        }
    }

    async fn mark_sent(&self, id: i64, ts: i64) {
        if let Err(e) = self.queue.mark_sent(id, ts).await {
            error!(id = id, error = %e, "queue_mark_sent_failed");
        }
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("default_batch_size", &self.default_batch_size)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::NewMessage;
    use crate::transport::MockTransport;

    fn test_config(interval_minutes: u32) -> Config {
        Config {
            database_url: "sqlite::memory:".to_string(),
            site_name: "Example News".to_string(),
            site_url: "https://news.example.com".to_string(),
            admin_email: "admin@example.com".to_string(),
            unsubscribe_secret: "secret".to_string(),
            send_interval_minutes: interval_minutes,
            default_batch_size: 50,
            tick_seconds: 60,
            port: 8080,
            event_signing_key: None,
            event_signature_max_age: 300,
            mail_api_url: None,
            mail_api_key: None,
            request_timeout_ms: 8000,
        }
    }

    async fn setup(interval_minutes: u32) -> (SqlitePool, Dispatcher, MockTransport) {
        let pool = db::connect("sqlite::memory:").await.unwrap();
        db::run_migrations(&pool).await.unwrap();
        let transport = MockTransport::new();
        let dispatcher = Dispatcher::new(
            &pool,
            &test_config(interval_minutes),
            Arc::new(transport.clone()),
        );
        (pool, dispatcher, transport)
    }

    #[tokio::test]
    async fn test_storage_unavailable_noops() {
        let pool = db::connect("sqlite::memory:").await.unwrap();
        let transport = MockTransport::new();
        let dispatcher =
            Dispatcher::new(&pool, &test_config(0), Arc::new(transport.clone()));

        let outcome = dispatcher.run_tick(Utc::now()).await.unwrap();
        assert_eq!(outcome, TickOutcome::StorageUnavailable);
        assert_eq!(transport.sent_count(), 0);
    }

    #[tokio::test]
    async fn test_gate_blocks_second_tick() {
        let (pool, dispatcher, transport) = setup(5).await;
        let queue = QueueStore::new(pool);
        let now = Utc::now();

        queue
            .enqueue(&NewMessage::new("a@example.com", "s", "b"), now.timestamp())
            .await
            .unwrap();

        let first = dispatcher.run_tick(now).await.unwrap();
        assert!(matches!(first, TickOutcome::Completed(_)));
        assert_eq!(transport.sent_count(), 1);

        // A second tick inside the interval is a pure no-op
        queue
            .enqueue(&NewMessage::new("b@example.com", "s", "b"), now.timestamp())
            .await
            .unwrap();
        let second = dispatcher
            .run_tick(now + chrono::Duration::seconds(10))
            .await
            .unwrap();
        assert_eq!(second, TickOutcome::RateLimited);
        assert_eq!(transport.sent_count(), 1);
    }

    #[tokio::test]
    async fn test_gate_recorded_on_empty_tick() {
        let (_pool, dispatcher, _transport) = setup(5).await;
        let now = Utc::now();

        let first = dispatcher.run_tick(now).await.unwrap();
        match first {
            TickOutcome::Completed(stats) => {
                assert_eq!(stats.attempted, 0);
                assert_eq!(stats.sent, 0);
            }
            other => panic!("unexpected outcome {:?}", other),
        }

        // Even with zero eligible rows the gate timestamp was recorded
        let second = dispatcher
            .run_tick(now + chrono::Duration::seconds(10))
            .await
            .unwrap();
        assert_eq!(second, TickOutcome::RateLimited);
    }

    #[tokio::test]
    async fn test_rows_not_reprocessed() {
        let (pool, dispatcher, transport) = setup(0).await;
        let queue = QueueStore::new(pool);
        let now = Utc::now();

        let id = queue
            .enqueue(&NewMessage::new("a@example.com", "s", "b"), now.timestamp())
            .await
            .unwrap();

        dispatcher.run_tick(now).await.unwrap();
        let row = queue.get(id).await.unwrap().unwrap();
        assert!(row.sent);

        // Interval 0 keeps the gate open; the row must still not be
        // fetched again
        let second = dispatcher
            .run_tick(now + chrono::Duration::seconds(1))
            .await
            .unwrap();
        match second {
            TickOutcome::Completed(stats) => assert_eq!(stats.attempted, 0),
            other => panic!("unexpected outcome {:?}", other),
        }
        assert_eq!(transport.sent_count(), 1);
        assert_eq!(
            queue.get(id).await.unwrap().unwrap().sent_at,
            row.sent_at
        );
    }

    #[tokio::test]
    async fn test_invalid_recipient_short_circuits() {
        let (pool, dispatcher, transport) = setup(0).await;
        let queue = QueueStore::new(pool.clone());
        let now = Utc::now();

        let id = queue
            .enqueue(&NewMessage::new("not-an-email", "s", "b"), now.timestamp())
            .await
            .unwrap();

        let outcome = dispatcher.run_tick(now).await.unwrap();
        match outcome {
            TickOutcome::Completed(stats) => {
                assert_eq!(stats.failed, 1);
                assert_eq!(stats.sent, 0);
            }
            other => panic!("unexpected outcome {:?}", other),
        }

        assert_eq!(transport.sent_count(), 0);
        assert!(queue.get(id).await.unwrap().unwrap().sent);

        let stats = ReputationTracker::new(pool).stats(now.timestamp()).await.unwrap();
        assert_eq!(stats.failed_count, 1);
    }

    #[tokio::test]
    async fn test_adaptive_shrink_after_bad_tick() {
        let (pool, dispatcher, transport) = setup(0).await;
        transport.fail_all();
        let queue = QueueStore::new(pool.clone());
        let now = Utc::now();

        for i in 0..5 {
            queue
                .enqueue(
                    &NewMessage::new(format!("r{}@example.com", i), "s", "b"),
                    now.timestamp(),
                )
                .await
                .unwrap();
        }

        dispatcher.run_tick(now).await.unwrap();

        let settings = SettingsStore::new(pool);
        let reduced = settings.batch_size(50, now.timestamp()).await.unwrap();
        assert_eq!(reduced, 40);
    }

    #[tokio::test]
    async fn test_shrink_floors_at_minimum() {
        let (pool, dispatcher, transport) = setup(0).await;
        transport.fail_all();
        let settings = SettingsStore::new(pool.clone());
        settings.set_batch_size(10).await.unwrap();

        let queue = QueueStore::new(pool);
        let now = Utc::now();
        queue
            .enqueue(&NewMessage::new("a@example.com", "s", "b"), now.timestamp())
            .await
            .unwrap();

        dispatcher.run_tick(now).await.unwrap();
        assert_eq!(settings.batch_size(50, now.timestamp()).await.unwrap(), 10);
    }

    #[tokio::test]
    async fn test_headers_synthesized_when_row_has_none() {
        let (pool, dispatcher, transport) = setup(0).await;
        let queue = QueueStore::new(pool);
        let now = Utc::now();

        queue
            .enqueue(
                &NewMessage::new("a@example.com", "s", "<p>b</p>"),
                now.timestamp(),
            )
            .await
            .unwrap();

        let mut explicit = NewMessage::new("b@example.com", "s", "<p>b</p>");
        explicit
            .headers
            .push(("X-Custom".to_string(), "1".to_string()));
        queue.enqueue(&explicit, now.timestamp()).await.unwrap();

        dispatcher.run_tick(now).await.unwrap();

        let sent = transport.sent();
        assert_eq!(sent.len(), 2);
        assert!(sent[0].headers.iter().any(|(k, _)| k == "Precedence"));
        assert_eq!(sent[1].headers, explicit.headers);
        // Bodies went through the enhancement pipeline
        assert!(sent[0].html_body.contains("View it in your browser"));
    }
}
