//! Queue row types.

use serde::{Deserialize, Serialize};

/// One outbound email attempt, as stored in the queue table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueMessage {
    /// Monotonically assigned row id; FIFO tie-break for equal `send_at`
    pub id: i64,
    /// Recipient email address
    pub recipient: String,
    /// Fully rendered subject line
    pub subject: String,
    /// Fully rendered HTML body; may still contain the
    /// `{unsubscribe_link}` placeholder token
    pub body: String,
    /// Transport headers; empty means defaults are synthesized at send time
    pub headers: Vec<(String, String)>,
    /// Earliest eligible dispatch time (epoch seconds)
    pub send_at: i64,
    /// Whether this row has been attempted; flips false -> true at most once
    pub sent: bool,
    /// When the row was marked sent; written exactly once
    pub sent_at: Option<i64>,
}

impl QueueMessage {
    /// Whether the producer supplied explicit transport headers.
    pub fn has_headers(&self) -> bool {
        !self.headers.is_empty()
    }
}

/// Producer-side payload for enqueueing a message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMessage {
    pub recipient: String,
    pub subject: String,
    pub body: String,
    /// Optional explicit headers; omitted means synthesize at send time
    #[serde(default)]
    pub headers: Vec<(String, String)>,
    /// Earliest dispatch time (epoch seconds); omitted means immediately
    /// eligible
    #[serde(default)]
    pub send_at: Option<i64>,
}

impl NewMessage {
    /// Create an immediately eligible message with default headers.
    pub fn new(
        recipient: impl Into<String>,
        subject: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            recipient: recipient.into(),
            subject: subject.into(),
            body: body.into(),
            headers: Vec::new(),
            send_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_message_deserialization_minimal() {
        let json = r#"{
            "recipient": "reader@example.com",
            "subject": "Weekly digest",
            "body": "<p>Hello</p>"
        }"#;

        let msg: NewMessage = serde_json::from_str(json).unwrap();
        assert_eq!(msg.recipient, "reader@example.com");
        assert!(msg.headers.is_empty());
        assert_eq!(msg.send_at, None);
    }

    #[test]
    fn test_new_message_deserialization_full() {
        let json = r#"{
            "recipient": "reader@example.com",
            "subject": "Weekly digest",
            "body": "<p>Hello</p>",
            "headers": [["X-Campaign-ID", "newsletter-2026-08-07"]],
            "send_at": 1765000000
        }"#;

        let msg: NewMessage = serde_json::from_str(json).unwrap();
        assert_eq!(msg.headers.len(), 1);
        assert_eq!(msg.send_at, Some(1_765_000_000));
    }

    #[test]
    fn test_queue_message_has_headers() {
        let mut msg = QueueMessage {
            id: 1,
            recipient: "reader@example.com".to_string(),
            subject: "s".to_string(),
            body: "b".to_string(),
            headers: Vec::new(),
            send_at: 0,
            sent: false,
            sent_at: None,
        };
        assert!(!msg.has_headers());

        msg.headers
            .push(("Precedence".to_string(), "bulk".to_string()));
        assert!(msg.has_headers());
    }
}
