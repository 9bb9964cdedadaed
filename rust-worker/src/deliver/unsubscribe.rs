//! Per-recipient unsubscribe URLs.
//!
//! Tokens are HMAC-SHA256 over the normalized recipient address, so links
//! are deterministic per recipient, unforgeable without the signing
//! secret, and carry no database state.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use url::form_urlencoded;
use url::Url;

type HmacSha256 = Hmac<Sha256>;

/// Signed token for a recipient.
///
/// Addresses are trimmed and lowercased first, so `User@Example.COM` and
/// `user@example.com` resolve to the same token.
pub fn unsubscribe_token(secret: &str, recipient: &str) -> String {
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return String::new();
    };
    mac.update(recipient.trim().to_ascii_lowercase().as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Full unsubscribe URL for a recipient.
pub fn unsubscribe_url(site_url: &str, secret: &str, recipient: &str) -> String {
    let token = unsubscribe_token(secret, recipient);

    match Url::parse(site_url) {
        Ok(mut url) => {
            url.set_path("/unsubscribe");
            url.set_fragment(None);
            url.query_pairs_mut()
                .clear()
                .append_pair("recipient", recipient)
                .append_pair("token", &token);
            url.to_string()
        }
        Err(_) => {
            let query: String = form_urlencoded::Serializer::new(String::new())
                .append_pair("recipient", recipient)
                .append_pair("token", &token)
                .finish();
            format!("{}/unsubscribe?{}", site_url.trim_end_matches('/'), query)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_is_deterministic_and_normalized() {
        let a = unsubscribe_token("secret", "reader@example.com");
        let b = unsubscribe_token("secret", "  Reader@EXAMPLE.com ");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_token_depends_on_secret_and_recipient() {
        let base = unsubscribe_token("secret", "reader@example.com");
        assert_ne!(base, unsubscribe_token("other", "reader@example.com"));
        assert_ne!(base, unsubscribe_token("secret", "other@example.com"));
    }

    #[test]
    fn test_url_contains_recipient_and_token() {
        let url = unsubscribe_url("https://news.example.com", "secret", "reader@example.com");
        assert!(url.starts_with("https://news.example.com/unsubscribe?"));
        assert!(url.contains("recipient=reader%40example.com"));
        assert!(url.contains("token="));
    }

    #[test]
    fn test_url_falls_back_on_unparseable_base() {
        let url = unsubscribe_url("not a url", "secret", "reader@example.com");
        assert!(url.contains("/unsubscribe?"));
        assert!(url.contains("recipient=reader%40example.com"));
    }
}
