//! Configuration module for environment variable parsing.
//!
//! Reads the static deployment configuration from environment variables.
//! Mutable runtime settings (batch size, reputation counters, the dispatch
//! gate timestamp) live in the persisted settings store instead, so they
//! survive restarts and can be written back by the feedback loop.

use std::env;

use tracing::warn;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// SQLite database URL backing the queue, settings and activity log
    pub database_url: String,

    /// Human-readable sender/site name used in the From and List-ID headers
    pub site_name: String,

    /// Public site URL; source of the sender domain, the unsubscribe
    /// endpoint and the "view in browser" link
    pub site_url: String,

    /// Administrative address used for From/Reply-To/Return-Path/Sender
    pub admin_email: String,

    /// Secret for signing per-recipient unsubscribe tokens
    pub unsubscribe_secret: String,

    /// Minimum number of minutes between dispatch ticks
    pub send_interval_minutes: u32,

    /// Operator-configured base batch size, used until the settings store
    /// holds an adjusted value
    pub default_batch_size: i64,

    /// Seconds between scheduler firings in the dispatcher daemon
    pub tick_seconds: u64,

    // =========================================================================
    // Web Server Configuration
    // =========================================================================

    /// Port for the web server to listen on
    pub port: u16,

    /// Signing key for verifying delivery event webhooks
    pub event_signing_key: Option<String>,

    /// Maximum age in seconds for delivery event timestamps
    pub event_signature_max_age: u64,

    // =========================================================================
    // Transport Configuration
    // =========================================================================

    /// HTTP mail API endpoint messages are posted to
    pub mail_api_url: Option<String>,

    /// Bearer token for the mail API
    pub mail_api_key: Option<String>,

    /// HTTP request timeout in milliseconds for transport calls
    pub request_timeout_ms: u64,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Config {
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://postwave.db".to_string()),

            site_name: env::var("SITE_NAME").unwrap_or_else(|_| "Postwave".to_string()),

            site_url: env::var("SITE_URL")
                .unwrap_or_else(|_| "http://localhost:8080".to_string()),

            admin_email: env::var("ADMIN_EMAIL")
                .unwrap_or_else(|_| "admin@localhost.localdomain".to_string()),

            unsubscribe_secret: env::var("UNSUBSCRIBE_SECRET").unwrap_or_else(|_| {
                warn!("UNSUBSCRIBE_SECRET not set, using development default");
                "postwave-dev-secret".to_string()
            }),

            send_interval_minutes: env::var("SEND_INTERVAL_MINUTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(5),

            default_batch_size: env::var("EMAIL_BATCH_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(50),

            tick_seconds: env::var("TICK_SECONDS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(60),

            // Web server configuration
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(8080),

            event_signing_key: non_empty(env::var("EVENT_SIGNING_KEY").ok()),

            event_signature_max_age: env::var("EVENT_SIGNATURE_MAX_AGE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(300), // 5 minutes default

            // Transport configuration
            mail_api_url: non_empty(env::var("MAIL_API_URL").ok()),

            mail_api_key: non_empty(env::var("MAIL_API_KEY").ok()),

            request_timeout_ms: env::var("REQUEST_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(8000),
        }
    }
}

/// Treat empty or whitespace-only values as unset.
fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
