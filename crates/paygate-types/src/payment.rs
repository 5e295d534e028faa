//! Payment aggregate
//!
//! The subject of the status machine. Mutations happen only through
//! [`Payment::apply`], which consults the transition table and stamps
//! the milestone timestamps; the store bumps `version` on every write
//! under optimistic concurrency.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::currency::Currency;
use crate::error::{GatewayError, GatewayResult};
use crate::status::{transition, PaymentStatus, TransitionEvent};

/// Maximum accepted merchant order reference length
pub const MAX_ORDER_ID_LEN: usize = 36;

#[derive(Debug, Clone)]
pub struct Payment {
    /// Internal row id
    pub id: Uuid,
    /// Public `pay_…` handle, unique per team
    pub payment_id: String,
    /// Merchant-supplied order reference; may repeat across payments
    pub order_id: String,
    pub team_id: Uuid,
    pub team_slug: String,
    /// Integer minor units, always positive
    pub amount: i64,
    pub currency: Currency,
    pub status: PaymentStatus,
    pub description: Option<String>,
    pub success_url: Option<String>,
    pub fail_url: Option<String>,
    pub notification_url: Option<String>,
    /// Customer contact captured at init, returned by status checks
    pub email: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub authorized_at: Option<DateTime<Utc>>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub refunded_at: Option<DateTime<Utc>>,
    /// Masked PAN recorded after authorization; never the full card
    pub card_mask: Option<String>,
    /// Opaque merchant receipt payload
    pub receipt: Option<serde_json::Value>,
    /// Opaque string map; the engine reads only `idempotencyKey` and
    /// `externalRequestId`
    pub metadata: HashMap<String, String>,
    /// Optimistic-concurrency counter, bumped by the store on write
    pub version: i64,
}

impl Payment {
    /// Fresh aggregate in `INIT`
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        payment_id: String,
        order_id: String,
        team_id: Uuid,
        team_slug: String,
        amount: i64,
        currency: Currency,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            payment_id,
            order_id,
            team_id,
            team_slug,
            amount,
            currency,
            status: PaymentStatus::Init,
            description: None,
            success_url: None,
            fail_url: None,
            notification_url: None,
            email: None,
            expires_at,
            created_at: now,
            updated_at: now,
            authorized_at: None,
            confirmed_at: None,
            cancelled_at: None,
            refunded_at: None,
            card_mask: None,
            receipt: None,
            metadata: HashMap::new(),
            version: 1,
        }
    }

    /// Drive the status machine. On success the status changes,
    /// `updated_at` and the milestone timestamp are stamped. The store
    /// write that follows bumps `version` or reports a conflict.
    pub fn apply(&mut self, event: TransitionEvent, now: DateTime<Utc>) -> GatewayResult<()> {
        let next = transition(self.status, event).map_err(|e| match e {
            GatewayError::InvalidState(_) => GatewayError::invalid_state(format!(
                "payment {} in status {} cannot accept {event:?}",
                self.payment_id, self.status
            )),
            other => other,
        })?;
        self.status = next;
        self.updated_at = now;
        match next {
            // Left unchanged when a confirm rollback re-enters AUTHORIZED.
            PaymentStatus::Authorized if self.authorized_at.is_none() => {
                self.authorized_at = Some(now)
            }
            PaymentStatus::Confirmed => self.confirmed_at = Some(now),
            PaymentStatus::Cancelled => self.cancelled_at = Some(now),
            PaymentStatus::Refunded | PaymentStatus::PartiallyRefunded => {
                self.refunded_at = Some(now)
            }
            _ => {}
        }
        Ok(())
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        !self.status.is_terminal() && self.expires_at <= now
    }

    /// Caller-supplied idempotency key for confirm, when present
    pub fn idempotency_key(&self) -> Option<&str> {
        self.metadata.get("idempotencyKey").map(String::as_str)
    }

    /// Caller-supplied external request id for cancel, when present
    pub fn external_request_id(&self) -> Option<&str> {
        self.metadata.get("externalRequestId").map(String::as_str)
    }
}

/// Validate a merchant order reference
pub fn validate_order_id(order_id: &str) -> GatewayResult<()> {
    if order_id.is_empty() {
        return Err(GatewayError::validation("OrderId must not be empty"));
    }
    if order_id.len() > MAX_ORDER_ID_LEN {
        return Err(GatewayError::validation(format!(
            "OrderId must be at most {MAX_ORDER_ID_LEN} characters"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn payment() -> Payment {
        let now = Utc::now();
        Payment::new(
            crate::id::new_payment_id(),
            "order-1".into(),
            Uuid::new_v4(),
            "acme".into(),
            150_000,
            Currency::RUB,
            now + Duration::minutes(15),
            now,
        )
    }

    #[test]
    fn apply_stamps_milestones() {
        let mut p = payment();
        let now = Utc::now();
        p.apply(TransitionEvent::Ready, now).unwrap();
        p.apply(TransitionEvent::FormShow, now).unwrap();
        p.apply(TransitionEvent::AuthStart, now).unwrap();
        p.apply(TransitionEvent::AuthOk, now).unwrap();
        assert_eq!(p.status, PaymentStatus::Authorized);
        assert_eq!(p.authorized_at, Some(now));

        p.apply(TransitionEvent::ConfirmStart, now).unwrap();
        p.apply(TransitionEvent::ConfirmOk, now).unwrap();
        assert_eq!(p.confirmed_at, Some(now));
    }

    #[test]
    fn apply_rejects_illegal_edge() {
        let mut p = payment();
        let err = p.apply(TransitionEvent::ConfirmStart, Utc::now()).unwrap_err();
        assert!(matches!(err, GatewayError::InvalidState(_)));
        assert_eq!(p.status, PaymentStatus::Init);
    }

    #[test]
    fn expiry_check_ignores_terminal() {
        let mut p = payment();
        let late = p.expires_at + Duration::minutes(1);
        assert!(p.is_expired(late));
        p.apply(TransitionEvent::Cancel, Utc::now()).unwrap();
        assert!(!p.is_expired(late));
    }

    #[test]
    fn order_id_bounds() {
        assert!(validate_order_id(&"x".repeat(36)).is_ok());
        assert!(validate_order_id(&"x".repeat(37)).is_err());
        assert!(validate_order_id("").is_err());
    }

    #[test]
    fn data_keys() {
        let mut p = payment();
        p.metadata.insert("idempotencyKey".into(), "k1".into());
        p.metadata.insert("externalRequestId".into(), "r1".into());
        assert_eq!(p.idempotency_key(), Some("k1"));
        assert_eq!(p.external_request_id(), Some("r1"));
    }
}
