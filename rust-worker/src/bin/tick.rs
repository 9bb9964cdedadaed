//! Postwave Tick - one-shot dispatch tick.
//!
//! For deployments that prefer an external scheduler (cron, systemd
//! timers) over the long-running daemon: runs a single tick and exits.
//! The dispatch gate still applies, so an overeager schedule cannot
//! outpace the configured send interval.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use postwave::transport::HttpApiTransport;
use postwave::{db, Config, Dispatcher, TickOutcome};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize structured JSON logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json().flatten_event(true))
        .init();

    let config = Config::from_env();

    let pool = db::connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    db::run_migrations(&pool)
        .await
        .context("Failed to run migrations")?;

    let transport = HttpApiTransport::from_config(&config)
        .context("Failed to build mail transport")?
        .context("MAIL_API_URL must be set")?;

    let dispatcher = Dispatcher::new(&pool, &config, Arc::new(transport));

    match dispatcher.run_tick(Utc::now()).await? {
        TickOutcome::Completed(stats) => {
            info!(
                attempted = stats.attempted,
                sent = stats.sent,
                failed = stats.failed,
                quota = stats.quota,
                "tick_complete"
            );
        }
        TickOutcome::RateLimited => info!("tick_rate_limited"),
        TickOutcome::StorageUnavailable => info!("tick_storage_unavailable"),
    }

    Ok(())
}
