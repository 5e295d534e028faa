//! Team (merchant) records
//!
//! A team is an authenticated API consumer identified by its slug. The
//! row carries two credentials: the terminal `secret` used in request
//! token computation, and an Argon2id `password_hash` for the
//! self-service basic-auth surface. Neither is ever serialized.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::currency::Currency;
use crate::error::{GatewayError, GatewayResult};

/// Slugs that can never be claimed by a merchant
pub const RESERVED_SLUGS: &[&str] = &[
    "admin", "api", "system", "internal", "root", "support", "payment",
    "payments", "gateway", "health", "metrics", "test",
];

/// Per-team amount and velocity limits, in minor units
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamLimits {
    pub min_amount: Option<i64>,
    pub max_amount: Option<i64>,
    pub daily_amount: Option<i64>,
    pub daily_count: Option<i64>,
    pub monthly_amount: Option<i64>,
}

impl TeamLimits {
    pub fn validate(&self) -> GatewayResult<()> {
        if let (Some(min), Some(max)) = (self.min_amount, self.max_amount) {
            if min > max {
                return Err(GatewayError::validation(
                    "min_amount must not exceed max_amount",
                ));
            }
        }
        if let (Some(daily), Some(monthly)) = (self.daily_amount, self.monthly_amount) {
            if daily > monthly {
                return Err(GatewayError::validation(
                    "daily_amount must not exceed monthly_amount",
                ));
            }
        }
        Ok(())
    }
}

/// Feature flags controlling optional behavior per team
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamFeatures {
    pub three_ds: bool,
    pub tokenization: bool,
    pub refunds: bool,
    pub partial_refunds: bool,
    pub reversals: bool,
    pub webhooks: bool,
    pub webhook_retries: u32,
    pub webhook_timeout_secs: u64,
}

impl Default for TeamFeatures {
    fn default() -> Self {
        Self {
            three_ds: false,
            tokenization: false,
            refunds: true,
            partial_refunds: false,
            reversals: true,
            webhooks: false,
            webhook_retries: 3,
            webhook_timeout_secs: 10,
        }
    }
}

/// Acquiring fee configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeConfig {
    /// Percentage fee in basis points
    pub percent_bps: i64,
    /// Fixed fee per payment, minor units
    pub fixed: i64,
}

/// A registered merchant
#[derive(Debug, Clone)]
pub struct Team {
    pub id: Uuid,
    pub slug: String,
    pub name: String,
    /// Terminal key used in request token computation. Opaque; compared
    /// only in constant time.
    pub secret: String,
    /// Argon2id hash of the self-service password
    pub password_hash: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub success_url: Option<String>,
    pub fail_url: Option<String>,
    pub notification_url: Option<String>,
    pub cancel_url: Option<String>,
    pub supported_currencies: Vec<Currency>,
    pub limits: TeamLimits,
    pub features: TeamFeatures,
    pub fees: FeeConfig,
    pub metadata: HashMap<String, String>,
    pub failed_auth_attempts: i32,
    pub locked_until: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Team {
    pub fn is_locked(&self, now: DateTime<Utc>) -> bool {
        self.locked_until.map(|until| now < until).unwrap_or(false)
    }

    pub fn supports(&self, currency: Currency) -> bool {
        self.supported_currencies.contains(&currency)
    }
}

/// Validate a merchant slug: 3-50 chars of `[a-zA-Z0-9_-]`, not reserved.
pub fn validate_slug(slug: &str) -> GatewayResult<()> {
    if slug.len() < 3 || slug.len() > 50 {
        return Err(GatewayError::validation(
            "team slug must be 3-50 characters",
        ));
    }
    if !slug
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(GatewayError::validation(
            "team slug may contain only letters, digits, '_' and '-'",
        ));
    }
    if RESERVED_SLUGS.contains(&slug.to_ascii_lowercase().as_str()) {
        return Err(GatewayError::validation(format!(
            "team slug '{slug}' is reserved"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slug_rules() {
        assert!(validate_slug("acme").is_ok());
        assert!(validate_slug("my_shop-2").is_ok());
        assert!(validate_slug("ab").is_err());
        assert!(validate_slug(&"x".repeat(51)).is_err());
        assert!(validate_slug("bad slug").is_err());
        assert!(validate_slug("admin").is_err());
        assert!(validate_slug("Admin").is_err());
    }

    #[test]
    fn limits_invariants() {
        let ok = TeamLimits {
            min_amount: Some(100),
            max_amount: Some(1_000_000),
            daily_amount: Some(5_000_000),
            monthly_amount: Some(50_000_000),
            ..Default::default()
        };
        assert!(ok.validate().is_ok());

        let inverted = TeamLimits {
            min_amount: Some(100),
            max_amount: Some(50),
            ..Default::default()
        };
        assert!(inverted.validate().is_err());

        let caps = TeamLimits {
            daily_amount: Some(100),
            monthly_amount: Some(50),
            ..Default::default()
        };
        assert!(caps.validate().is_err());
    }

    #[test]
    fn lock_window() {
        let now = Utc::now();
        let mut team = Team {
            id: Uuid::new_v4(),
            slug: "acme".into(),
            name: "Acme".into(),
            secret: "s".into(),
            password_hash: "h".into(),
            email: None,
            phone: None,
            success_url: None,
            fail_url: None,
            notification_url: None,
            cancel_url: None,
            supported_currencies: vec![Currency::RUB],
            limits: TeamLimits::default(),
            features: TeamFeatures::default(),
            fees: FeeConfig::default(),
            metadata: HashMap::new(),
            failed_auth_attempts: 0,
            locked_until: None,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        assert!(!team.is_locked(now));
        team.locked_until = Some(now + chrono::Duration::minutes(15));
        assert!(team.is_locked(now));
        assert!(!team.is_locked(now + chrono::Duration::minutes(16)));
    }
}
