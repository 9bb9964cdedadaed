//! Intra-batch send pacing using the token bucket algorithm.
//!
//! Coarse rate control between individual sends within one tick, distinct
//! from the inter-tick dispatch gate. A bucket with a burst capacity of 10
//! and a refill rate of 5 tokens/sec lets the first ten messages go out
//! immediately, then sustains roughly ten messages every two seconds,
//! without parking the dispatch task on fixed-length sleeps.

use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

const DEFAULT_BURST: u32 = 10;
const DEFAULT_REFILL_PER_SEC: f64 = 5.0;

/// Token bucket pacer for sequential sends.
#[derive(Debug)]
pub struct SendPacer {
    tokens: f64,
    capacity: f64,
    refill_rate: f64,
    last_refill: Instant,
}

impl SendPacer {
    /// Create a pacer with the given burst capacity and refill rate.
    pub fn new(burst: u32, refill_per_sec: f64) -> Self {
        let capacity = f64::from(burst.max(1));
        Self {
            tokens: capacity, // Start with full bucket
            capacity,
            refill_rate: refill_per_sec.max(f64::MIN_POSITIVE),
            last_refill: Instant::now(),
        }
    }

    /// The pacing used by the queue dispatcher.
    pub fn for_queue_pacing() -> Self {
        Self::new(DEFAULT_BURST, DEFAULT_REFILL_PER_SEC)
    }

    /// Refill tokens based on elapsed time.
    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_rate).min(self.capacity);
        self.last_refill = now;
    }

    /// Consume one token, waiting for a refill if the bucket is empty.
    pub async fn acquire(&mut self) {
        self.refill();

        if self.tokens < 1.0 {
            let deficit = 1.0 - self.tokens;
            let wait = Duration::from_secs_f64(deficit / self.refill_rate);
            debug!(wait_ms = wait.as_millis() as u64, "send_pacer_waiting");
            tokio::time::sleep(wait).await;
            self.refill();
        }

        self.tokens = (self.tokens - 1.0).max(0.0);
    }
}
