//! Audit log entries
//!
//! Append-only operational record, retained independent of the payment
//! lifecycle. Detail payloads never contain card data.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditOutcome {
    Success,
    Failure,
    Warning,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    /// `team:{slug}`, `admin`, or `system` for the sweep
    pub actor: String,
    /// Operation name, e.g. `payment_init`, `payment_confirm`
    pub action: String,
    pub payment_id: Option<String>,
    pub team_slug: Option<String>,
    pub outcome: AuditOutcome,
    pub detail: serde_json::Value,
}

impl AuditEntry {
    pub fn new(
        actor: impl Into<String>,
        action: impl Into<String>,
        outcome: AuditOutcome,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: now,
            actor: actor.into(),
            action: action.into(),
            payment_id: None,
            team_slug: None,
            outcome,
            detail: serde_json::Value::Null,
        }
    }

    pub fn with_payment(mut self, payment_id: impl Into<String>) -> Self {
        self.payment_id = Some(payment_id.into());
        self
    }

    pub fn with_team(mut self, slug: impl Into<String>) -> Self {
        self.team_slug = Some(slug.into());
        self
    }

    pub fn with_detail(mut self, detail: serde_json::Value) -> Self {
        self.detail = detail;
        self
    }
}
