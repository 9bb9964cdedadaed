//! Delivery event signature verification.
//!
//! Providers sign event webhooks with HMAC-SHA256 over
//! `timestamp + token` using a shared signing key, and include the hex
//! digest alongside. Events older than the configured window are
//! rejected to block replays.

use std::time::{SystemTime, UNIX_EPOCH};

use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::warn;

type HmacSha256 = Hmac<Sha256>;

/// Whether signature verification is active for the given key setting.
pub fn verification_enabled(signing_key: Option<&str>) -> bool {
    signing_key.map(|k| !k.trim().is_empty()).unwrap_or(false)
}

/// Verify a delivery event signature.
///
/// Returns `true` only when all fields are present, the timestamp is
/// within `max_age_seconds` of now, and the HMAC digest matches.
pub fn verify_event_signature(
    signing_key: &str,
    timestamp: &str,
    token: &str,
    signature: &str,
    max_age_seconds: u64,
) -> bool {
    if signing_key.is_empty() || timestamp.is_empty() || token.is_empty() || signature.is_empty() {
        warn!("event_signature_missing_fields");
        return false;
    }

    let Ok(event_time) = timestamp.parse::<u64>() else {
        warn!(timestamp = %timestamp, "event_signature_bad_timestamp");
        return false;
    };

    let current_time = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();

    if current_time.abs_diff(event_time) > max_age_seconds {
        warn!(
            event_time = event_time,
            current_time = current_time,
            max_age_seconds = max_age_seconds,
            "event_signature_stale"
        );
        return false;
    }

    let Ok(mut mac) = HmacSha256::new_from_slice(signing_key.as_bytes()) else {
        warn!("event_signature_invalid_key");
        return false;
    };
    mac.update(timestamp.as_bytes());
    mac.update(token.as_bytes());
    let expected = hex::encode(mac.finalize().into_bytes());

    let valid = constant_time_compare(&expected, signature);
    if !valid {
        warn!("event_signature_mismatch");
    }
    valid
}

/// Constant-time string comparison to prevent timing attacks.
fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }
    result == 0
}
