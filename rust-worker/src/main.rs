//! Postwave Dispatcher - long-running queue draining daemon.
//!
//! Fires a dispatch tick on a fixed cadence (default once per minute).
//! The cadence is deliberately coarser-grained than the dispatch gate:
//! the gate decides whether a given tick actually sends anything.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use tokio::signal;
use tracing::{error, info};
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

    info!("dispatcher_starting");

    // Load configuration from environment
    let config = Config::from_env();
    info!(
        database_url_set = !config.database_url.is_empty(),
        interval_minutes = config.send_interval_minutes,
        default_batch_size = config.default_batch_size,
        tick_seconds = config.tick_seconds,
        "config_loaded"
    );

    let pool = db::connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    db::run_migrations(&pool)
        .await
        .context("Failed to run migrations")?;

    info!("database_ready");

    let transport = HttpApiTransport::from_config(&config)
        .context("Failed to build mail transport")?
        .context("MAIL_API_URL must be set for the dispatcher daemon")?;

    let dispatcher = Dispatcher::new(&pool, &config, Arc::new(transport));

    run(dispatcher, config.tick_seconds).await;

    info!("dispatcher_shutdown_complete");
    Ok(())
}

/// Run ticks on the configured cadence until a shutdown signal arrives.
///
/// Ticks are awaited in this single loop, so they never overlap.
async fn run(dispatcher: Dispatcher, tick_seconds: u64) {
    let mut interval = tokio::time::interval(Duration::from_secs(tick_seconds.max(1)));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    // Create shutdown signal future
    let shutdown = async {
        let ctrl_c = async {
            signal::ctrl_c()
                .await
                .expect("Failed to install Ctrl+C handler");
        };

        #[cfg(unix)]
        let terminate = async {
            signal::unix::signal(signal::unix::SignalKind::terminate())
                .expect("Failed to install SIGTERM handler")
                .recv()
                .await;
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => info!("Received SIGINT"),
            _ = terminate => info!("Received SIGTERM"),
        }
    };

    // Pin the shutdown future
    tokio::pin!(shutdown);

    info!("dispatcher_ready");

    loop {
        tokio::select! {
            // Check for shutdown signal
            _ = &mut shutdown => {
                info!("dispatcher_stopping");
                break;
            }
            _ = interval.tick() => {
                match dispatcher.run_tick(Utc::now()).await {
                    Ok(TickOutcome::Completed(stats)) => {
                        if stats.attempted > 0 {
                            info!(
                                sent = stats.sent,
                                failed = stats.failed,
                                "scheduled_tick_complete"
                            );
                        }
                    }
                    Ok(TickOutcome::RateLimited) | Ok(TickOutcome::StorageUnavailable) => {}
                    Err(e) => {
                        error!(error = %e, "scheduled_tick_failed");
                    }
                }
            }
        }
    }
}
