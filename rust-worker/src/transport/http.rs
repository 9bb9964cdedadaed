//! HTTP mail API transport.
//!
//! Posts a JSON envelope to a provider endpoint. A 2xx response means the
//! provider accepted the message; definitive delivery or bounce arrives
//! later through the delivery event webhook.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::{info, warn};

use url::Url;

use super::{Transport, TransportError};
use crate::config::Config;

/// JSON envelope posted to the mail API.
#[derive(Debug, Serialize)]
struct SendEnvelope<'a> {
    to: &'a str,
    subject: &'a str,
    html: &'a str,
    headers: &'a [(String, String)],
}

/// Transport that submits messages to an HTTP mail API.
#[derive(Debug, Clone)]
pub struct HttpApiTransport {
    client: Client,
    api_url: String,
    api_key: Option<String>,
}

impl HttpApiTransport {
    /// Build from configuration; `None` when no API endpoint is set.
    pub fn from_config(config: &Config) -> Result<Option<Self>, TransportError> {
        let Some(api_url) = config.mail_api_url.clone() else {
            return Ok(None);
        };

        if Url::parse(&api_url).is_err() {
            return Err(TransportError::Config(format!(
                "MAIL_API_URL is not a valid URL: {}",
                api_url
            )));
        }

        let client = Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .pool_max_idle_per_host(10)
            .build()?;

        Ok(Some(Self {
            client,
            api_url,
            api_key: config.mail_api_key.clone(),
        }))
    }
}

#[async_trait]
impl Transport for HttpApiTransport {
    async fn send(
        &self,
        recipient: &str,
        subject: &str,
        html_body: &str,
        headers: &[(String, String)],
    ) -> Result<bool, TransportError> {
        let envelope = SendEnvelope {
            to: recipient,
            subject,
            html: html_body,
            headers,
        };

        let mut request = self.client.post(&self.api_url).json(&envelope);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();

        if status.is_success() {
            info!(recipient = recipient, status = status.as_u16(), "mail_api_accepted");
            Ok(true)
        } else {
            warn!(recipient = recipient, status = status.as_u16(), "mail_api_rejected");
            Ok(false)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_config_none_without_url() {
        let mut config = test_config();
        config.mail_api_url = None;
        assert!(HttpApiTransport::from_config(&config).unwrap().is_none());
    }

    #[test]
    fn test_from_config_some_with_url() {
        let config = test_config();
        let transport = HttpApiTransport::from_config(&config).unwrap();
        assert!(transport.is_some());
    }

    #[test]
    fn test_from_config_rejects_bad_url() {
        let mut config = test_config();
        config.mail_api_url = Some("not a url".to_string());
        assert!(matches!(
            HttpApiTransport::from_config(&config),
            Err(TransportError::Config(_))
        ));
    }

    #[test]
    fn test_envelope_serialization() {
        let headers = vec![("Precedence".to_string(), "bulk".to_string())];
        let envelope = SendEnvelope {
            to: "reader@example.com",
            subject: "Digest",
            html: "<p>Hi</p>",
            headers: &headers,
        };

        let json = serde_json::to_string(&envelope).unwrap();
        assert!(json.contains("\"to\":\"reader@example.com\""));
        assert!(json.contains("\"Precedence\""));
    }

    fn test_config() -> Config {
        Config {
            database_url: "sqlite::memory:".to_string(),
            site_name: "Test".to_string(),
            site_url: "http://localhost".to_string(),
            admin_email: "admin@example.com".to_string(),
            unsubscribe_secret: "secret".to_string(),
            send_interval_minutes: 5,
            default_batch_size: 50,
            tick_seconds: 60,
            port: 8080,
            event_signing_key: None,
            event_signature_max_age: 300,
            mail_api_url: Some("http://localhost:9999/send".to_string()),
            mail_api_key: Some("key".to_string()),
            request_timeout_ms: 8000,
        }
    }
}
