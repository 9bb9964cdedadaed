//! Postwave - bulk email queue and deliverability controller.
//!
//! This library provides shared modules for the three Postwave binaries:
//! - `postwave-web`: Producer-facing HTTP surface (enqueue, send-now,
//!   delivery events)
//! - `postwave-dispatcher`: Long-running daemon draining the queue on a
//!   fixed cadence
//! - `postwave-tick`: One-shot tick for external cron schedulers
//!
//! ## Architecture
//!
//! ```text
//! Producers → email_queue → Dispatcher tick → Enhancer → Transport
//!                 ↑              ↓ feedback
//!           Web Server    batch size / reputation
//! ```

pub mod activity;
pub mod batch;
pub mod config;
pub mod db;
pub mod deliver;
pub mod dispatch;
pub mod gate;
pub mod producer;
pub mod queue;
pub mod reputation;
pub mod settings;
pub mod throttle;
pub mod transport;
pub mod util;
pub mod web;

// Re-export commonly used types
pub use activity::{ActivityLog, EventKind};
pub use config::Config;
pub use deliver::Enhancer;
pub use dispatch::{Dispatcher, TickOutcome, TickStats};
pub use queue::{NewMessage, QueueMessage, QueueStore};
pub use reputation::{ReputationStats, ReputationTracker};
pub use transport::{HttpApiTransport, MockTransport, Transport};
pub use web::AppState;
