//! Transport header synthesis for bulk mail.
//!
//! When a queue row carries no explicit headers, the dispatcher sends
//! with this canonical set: sender identification, RFC 2369 list
//! management headers, one-click unsubscribe, bulk-mail markers and a
//! deterministic per-day campaign identifier.

use chrono::NaiveDate;
use rand::Rng;
use sha2::{Digest, Sha256};
use url::Url;

/// Host part of the site URL, used for List-ID and Message-ID.
pub fn sender_domain(site_url: &str) -> String {
    Url::parse(site_url)
        .ok()
        .and_then(|url| url.host_str().map(str::to_string))
        .unwrap_or_else(|| "localhost".to_string())
}

/// Deterministic per-day campaign identifier: first 16 hex chars of
/// SHA-256 over the sender domain and the date.
pub fn campaign_ref(domain: &str, date: NaiveDate) -> String {
    let mut hasher = Sha256::new();
    hasher.update(domain.as_bytes());
    hasher.update(date.format("%Y-%m-%d").to_string().as_bytes());
    let mut hex = hex::encode(hasher.finalize());
    hex.truncate(16);
    hex
}

/// Fresh RFC 5322 Message-ID for the sender domain.
pub fn message_id(domain: &str) -> String {
    let token: u128 = rand::thread_rng().gen();
    format!("<{:032x}@{}>", token, domain)
}

/// Build the canonical default header set for one recipient.
pub fn synthesize(
    site_name: &str,
    site_url: &str,
    admin_email: &str,
    unsubscribe_url: &str,
    date: NaiveDate,
) -> Vec<(String, String)> {
    let domain = sender_domain(site_url);

    vec![
        // Authentication and identification
        (
            "From".to_string(),
            format!("{} <{}>", site_name, admin_email),
        ),
        ("Reply-To".to_string(), admin_email.to_string()),
        ("Return-Path".to_string(), admin_email.to_string()),
        ("Sender".to_string(), admin_email.to_string()),
        // Content type and encoding
        (
            "Content-Type".to_string(),
            "text/html; charset=UTF-8".to_string(),
        ),
        ("MIME-Version".to_string(), "1.0".to_string()),
        ("Message-ID".to_string(), message_id(&domain)),
        // List management (RFC 2369)
        (
            "List-ID".to_string(),
            format!("{} Newsletter <newsletter.{}>", site_name, domain),
        ),
        (
            "List-Unsubscribe".to_string(),
            format!("<{}>", unsubscribe_url),
        ),
        (
            "List-Unsubscribe-Post".to_string(),
            "List-Unsubscribe=One-Click".to_string(),
        ),
        ("List-Archive".to_string(), format!("<{}>", site_url)),
        (
            "List-Owner".to_string(),
            format!("<mailto:{}>", admin_email),
        ),
        // Bulk email identification
        ("Precedence".to_string(), "bulk".to_string()),
        ("Auto-Submitted".to_string(), "auto-generated".to_string()),
        // Feedback loop headers
        (
            "X-Campaign-ID".to_string(),
            format!("newsletter-{}", date.format("%Y-%m-%d")),
        ),
        ("X-Campaign-Ref".to_string(), campaign_ref(&domain, date)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 8, 7).unwrap()
    }

    #[test]
    fn test_sender_domain() {
        assert_eq!(sender_domain("https://news.example.com/path"), "news.example.com");
        assert_eq!(sender_domain("garbage"), "localhost");
    }

    #[test]
    fn test_campaign_ref_deterministic_per_day() {
        let a = campaign_ref("example.com", date());
        let b = campaign_ref("example.com", date());
        assert_eq!(a, b);
        assert_eq!(a.len(), 16);

        let next_day = NaiveDate::from_ymd_opt(2026, 8, 8).unwrap();
        assert_ne!(a, campaign_ref("example.com", next_day));
        assert_ne!(a, campaign_ref("other.com", date()));
    }

    #[test]
    fn test_message_id_shape() {
        let id = message_id("example.com");
        assert!(id.starts_with('<'));
        assert!(id.ends_with("@example.com>"));
        assert_ne!(id, message_id("example.com"));
    }

    #[test]
    fn test_synthesize_canonical_set() {
        let headers = synthesize(
            "Example News",
            "https://news.example.com",
            "admin@example.com",
            "https://news.example.com/unsubscribe?recipient=r%40e.com&token=t",
            date(),
        );

        let get = |name: &str| {
            headers
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.as_str())
        };

        assert_eq!(get("From"), Some("Example News <admin@example.com>"));
        assert_eq!(get("Precedence"), Some("bulk"));
        assert_eq!(get("Auto-Submitted"), Some("auto-generated"));
        assert_eq!(
            get("List-Unsubscribe-Post"),
            Some("List-Unsubscribe=One-Click")
        );
        assert_eq!(get("X-Campaign-ID"), Some("newsletter-2026-08-07"));
        assert!(get("List-ID").unwrap().contains("newsletter.news.example.com"));
        assert!(get("List-Unsubscribe").unwrap().starts_with('<'));
        assert!(get("Message-ID").is_some());
    }
}
