//! Durable outbound email queue.
//!
//! Every queued message is one row: produced once, fetched by the
//! dispatcher when eligible, and marked sent exactly once regardless of
//! transmission outcome. Rows are never deleted by the worker.

pub mod store;
pub mod types;

pub use store::QueueStore;
pub use types::{NewMessage, QueueMessage};
