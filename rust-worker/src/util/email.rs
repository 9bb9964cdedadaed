//! Recipient address validation.
//!
//! Syntactic checks only; no DNS or mailbox verification. Addresses that
//! fail here are dropped before the transport is ever invoked.

/// Characters permitted in the local part besides alphanumerics.
const LOCAL_EXTRA: &str = "!#$%&'*+/=?^_`{|}~.-";

/// Check whether an address is syntactically deliverable.
///
/// Rules (deliberately conservative):
/// - exactly one `@`, with non-empty local and domain parts
/// - no whitespace anywhere
/// - local part uses alphanumerics plus common special characters,
///   without leading/trailing/consecutive dots
/// - domain has at least two dot-separated labels of alphanumerics and
///   hyphens, none empty, none starting or ending with a hyphen
pub fn is_valid_email(address: &str) -> bool {
    if address.len() < 6 || address.chars().any(char::is_whitespace) {
        return false;
    }

    let Some((local, domain)) = address.split_once('@') else {
        return false;
    };

    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return false;
    }

    if local.starts_with('.') || local.ends_with('.') || local.contains("..") {
        return false;
    }

    if !local
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || LOCAL_EXTRA.contains(c))
    {
        return false;
    }

    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() < 2 {
        return false;
    }

    labels.iter().all(|label| {
        !label.is_empty()
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_common_addresses() {
        assert!(is_valid_email("user@example.com"));
        assert!(is_valid_email("first.last@example.co.uk"));
        assert!(is_valid_email("user+tag@example.com"));
        assert!(is_valid_email("u_1@sub.example.org"));
    }

    #[test]
    fn test_rejects_malformed_addresses() {
        assert!(!is_valid_email("not-an-email"));
        assert!(!is_valid_email(""));
        assert!(!is_valid_email("a@b"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("user@"));
        assert!(!is_valid_email("user@@example.com"));
        assert!(!is_valid_email("us er@example.com"));
        assert!(!is_valid_email("user@-example.com"));
        assert!(!is_valid_email(".user@example.com"));
        assert!(!is_valid_email("us..er@example.com"));
    }

    #[test]
    fn test_rejects_short_strings() {
        assert!(!is_valid_email("a@b.c"));
    }
}
