//! Request token construction
//!
//! Both sides must produce the same bytes: collect the root-level
//! scalar parameters agreed for the operation, append the team password
//! under the key `Password`, sort entries by key in ASCII order,
//! concatenate the values with no separators, and take the lowercase
//! hex SHA-256 of the result. Nested objects (Receipt, Items, Data)
//! never participate.

use std::collections::BTreeMap;

use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// The signed root-level scalars for one operation. A `BTreeMap` keeps
/// the entries in ASCII key order.
#[derive(Debug, Clone)]
pub struct SignedFields(BTreeMap<String, String>);

impl SignedFields {
    /// Signing set for `init`: {Amount, Currency, OrderId, TeamSlug}
    pub fn init(amount: i64, currency: &str, order_id: &str, team_slug: &str) -> Self {
        let mut map = BTreeMap::new();
        map.insert("Amount".to_string(), amount.to_string());
        map.insert("Currency".to_string(), currency.to_string());
        map.insert("OrderId".to_string(), order_id.to_string());
        map.insert("TeamSlug".to_string(), team_slug.to_string());
        Self(map)
    }

    /// Signing set for confirm/cancel/check: {TeamSlug, PaymentId}
    /// plus Amount when the caller sent one.
    pub fn payment_op(team_slug: &str, payment_id: &str, amount: Option<i64>) -> Self {
        let mut map = BTreeMap::new();
        map.insert("TeamSlug".to_string(), team_slug.to_string());
        map.insert("PaymentId".to_string(), payment_id.to_string());
        if let Some(amount) = amount {
            map.insert("Amount".to_string(), amount.to_string());
        }
        Self(map)
    }

    /// Check by order reference instead of payment id.
    pub fn order_op(team_slug: &str, order_id: &str) -> Self {
        let mut map = BTreeMap::new();
        map.insert("TeamSlug".to_string(), team_slug.to_string());
        map.insert("OrderId".to_string(), order_id.to_string());
        Self(map)
    }
}

/// Lowercase hex SHA-256 over the sorted value concatenation.
pub fn compute_token(fields: &SignedFields, password: &str) -> String {
    let mut entries = fields.0.clone();
    entries.insert("Password".to_string(), password.to_string());

    let mut hasher = Sha256::new();
    for value in entries.values() {
        hasher.update(value.as_bytes());
    }
    hex::encode(hasher.finalize())
}

/// Constant-time comparison of a caller token against the expected one.
pub fn verify_token(provided: &str, fields: &SignedFields, password: &str) -> bool {
    let expected = compute_token(fields, password);
    expected.as_bytes().ct_eq(provided.as_bytes()).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_is_sorted_value_concatenation() {
        // Amount, Currency, OrderId, Password, TeamSlug in ASCII order.
        let fields = SignedFields::init(150_000, "RUB", "order-1", "acme");
        let token = compute_token(&fields, "s3cret!");

        let mut hasher = Sha256::new();
        hasher.update(b"150000");
        hasher.update(b"RUB");
        hasher.update(b"order-1");
        hasher.update(b"s3cret!");
        hasher.update(b"acme");
        assert_eq!(token, hex::encode(hasher.finalize()));
    }

    #[test]
    fn payment_id_sorts_before_password_and_team_slug() {
        let fields = SignedFields::payment_op("acme", "pay_1", Some(500));
        let token = compute_token(&fields, "pw");

        let mut hasher = Sha256::new();
        // Amount < PaymentId < Password < TeamSlug
        hasher.update(b"500");
        hasher.update(b"pay_1");
        hasher.update(b"pw");
        hasher.update(b"acme");
        assert_eq!(token, hex::encode(hasher.finalize()));
    }

    #[test]
    fn amount_is_optional_for_payment_ops() {
        let with = compute_token(&SignedFields::payment_op("acme", "pay_1", Some(1)), "pw");
        let without = compute_token(&SignedFields::payment_op("acme", "pay_1", None), "pw");
        assert_ne!(with, without);
    }

    #[test]
    fn verification_detects_tampering() {
        let fields = SignedFields::init(150_000, "RUB", "order-1", "acme");
        let token = compute_token(&fields, "s3cret!");
        assert!(verify_token(&token, &fields, "s3cret!"));

        let tampered = SignedFields::init(150_001, "RUB", "order-1", "acme");
        assert!(!verify_token(&token, &tampered, "s3cret!"));
        assert!(!verify_token(&token, &fields, "other-password"));
        assert!(!verify_token("not-hex-at-all", &fields, "s3cret!"));
    }

    #[test]
    fn token_is_lowercase_hex() {
        let token = compute_token(&SignedFields::order_op("acme", "order-1"), "pw");
        assert_eq!(token.len(), 64);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }
}
