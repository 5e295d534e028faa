//! Identifier generation
//!
//! Internal rows use UUIDv4; the public payment handle is `pay_` plus a
//! lowercase ULID, which sorts by creation time and is URL-safe.

use ulid::Ulid;
use uuid::Uuid;

/// Prefix of every public payment identifier
pub const PAYMENT_ID_PREFIX: &str = "pay_";

/// New public payment identifier, e.g. `pay_01hv3x9z8k4qj5m2c7t0d6w8r4`
pub fn new_payment_id() -> String {
    format!("{}{}", PAYMENT_ID_PREFIX, Ulid::new().to_string().to_lowercase())
}

/// Server-assigned request identifier used for replay binding and the
/// `X-Request-Id` response header.
pub fn new_request_id() -> String {
    Uuid::new_v4().to_string()
}

/// Whether `s` has the shape of a public payment identifier
pub fn looks_like_payment_id(s: &str) -> bool {
    s.len() == PAYMENT_ID_PREFIX.len() + 26
        && s.starts_with(PAYMENT_ID_PREFIX)
        && s[PAYMENT_ID_PREFIX.len()..]
            .chars()
            .all(|c| c.is_ascii_alphanumeric())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payment_ids_are_prefixed_and_unique() {
        let a = new_payment_id();
        let b = new_payment_id();
        assert!(a.starts_with("pay_"));
        assert_ne!(a, b);
        assert!(looks_like_payment_id(&a));
    }

    #[test]
    fn rejects_foreign_shapes() {
        assert!(!looks_like_payment_id("order-1"));
        assert!(!looks_like_payment_id("pay_"));
        assert!(!looks_like_payment_id("pay_!!!"));
    }
}
