//! Transport capability: hands a prepared message to a mail system.
//!
//! The dispatcher only sees the trait. The boolean result is the
//! synchronous accept/reject outcome; transports with deferred
//! confirmation additionally surface delivery events through the web
//! server's event endpoint, which feeds the reputation tracker.

pub mod http;

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use thiserror::Error;

pub use http::HttpApiTransport;

/// Errors surfaced by a transport implementation.
///
/// Either way the affected row is still marked sent; transport errors
/// count as failures and are never retried.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("transport request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("transport configuration invalid: {0}")]
    Config(String),
}

/// Capability that delivers one prepared message.
#[async_trait]
pub trait Transport: Send + Sync + std::fmt::Debug {
    /// Hand one message to the mail system.
    ///
    /// `Ok(true)` means accepted, `Ok(false)` means rejected; `Err` is a
    /// transport-level fault (network, configuration). All three leave
    /// the queue row marked sent.
    async fn send(
        &self,
        recipient: &str,
        subject: &str,
        html_body: &str,
        headers: &[(String, String)],
    ) -> Result<bool, TransportError>;
}

/// A message captured by [`MockTransport`].
#[derive(Debug, Clone)]
pub struct CapturedMessage {
    pub recipient: String,
    pub subject: String,
    pub html_body: String,
    pub headers: Vec<(String, String)>,
}

/// In-memory transport for tests and dry runs.
///
/// Records every send and can be scripted to reject specific recipients
/// or everything.
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    sent: Arc<Mutex<Vec<CapturedMessage>>>,
    failing_recipients: Arc<Mutex<HashSet<String>>>,
    fail_all: Arc<Mutex<bool>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// All messages handed to this transport, in order.
    ///
    /// # Panics
    /// Panics if the mutex is poisoned
    pub fn sent(&self) -> Vec<CapturedMessage> {
        self.sent
            .lock()
            .expect("MockTransport sent mutex poisoned")
            .clone()
    }

    /// Number of send invocations.
    ///
    /// # Panics
    /// Panics if the mutex is poisoned
    pub fn sent_count(&self) -> usize {
        self.sent
            .lock()
            .expect("MockTransport sent mutex poisoned")
            .len()
    }

    /// Make sends to this recipient report failure.
    ///
    /// # Panics
    /// Panics if the mutex is poisoned
    pub fn fail_recipient(&self, recipient: &str) {
        self.failing_recipients
            .lock()
            .expect("MockTransport failing mutex poisoned")
            .insert(recipient.to_string());
    }

    /// Make every send report failure.
    ///
    /// # Panics
    /// Panics if the mutex is poisoned
    pub fn fail_all(&self) {
        *self
            .fail_all
            .lock()
            .expect("MockTransport fail_all mutex poisoned") = true;
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(
        &self,
        recipient: &str,
        subject: &str,
        html_body: &str,
        headers: &[(String, String)],
    ) -> Result<bool, TransportError> {
        self.sent
            .lock()
            .expect("MockTransport sent mutex poisoned")
            .push(CapturedMessage {
                recipient: recipient.to_string(),
                subject: subject.to_string(),
                html_body: html_body.to_string(),
                headers: headers.to_vec(),
            });

        let rejected = *self
            .fail_all
            .lock()
            .expect("MockTransport fail_all mutex poisoned")
            || self
                .failing_recipients
                .lock()
                .expect("MockTransport failing mutex poisoned")
                .contains(recipient);

        Ok(!rejected)
    }
}
