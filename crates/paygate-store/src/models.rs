//! Database row types
//!
//! Row structs mirror the relational layout and convert to/from the
//! domain aggregates. Enum-valued columns are stored as their wire
//! strings; structured columns are JSONB.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

use paygate_types::{
    AuditOutcome, Currency, FeeConfig, Payment, PaymentStatus, Team, TeamFeatures, TeamLimits,
    Transaction, TransactionStatus, TransactionType,
};

use crate::error::StoreError;

#[derive(Debug, FromRow)]
pub struct TeamRow {
    pub id: Uuid,
    pub slug: String,
    pub name: String,
    pub secret: String,
    pub password_hash: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub success_url: Option<String>,
    pub fail_url: Option<String>,
    pub notification_url: Option<String>,
    pub cancel_url: Option<String>,
    pub supported_currencies: Json<Vec<Currency>>,
    pub limits: Json<TeamLimits>,
    pub features: Json<TeamFeatures>,
    pub fees: Json<FeeConfig>,
    pub metadata: Json<HashMap<String, String>>,
    pub failed_auth_attempts: i32,
    pub locked_until: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<TeamRow> for Team {
    fn from(row: TeamRow) -> Self {
        Team {
            id: row.id,
            slug: row.slug,
            name: row.name,
            secret: row.secret,
            password_hash: row.password_hash,
            email: row.email,
            phone: row.phone,
            success_url: row.success_url,
            fail_url: row.fail_url,
            notification_url: row.notification_url,
            cancel_url: row.cancel_url,
            supported_currencies: row.supported_currencies.0,
            limits: row.limits.0,
            features: row.features.0,
            fees: row.fees.0,
            metadata: row.metadata.0,
            failed_auth_attempts: row.failed_auth_attempts,
            locked_until: row.locked_until,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, FromRow)]
pub struct PaymentRow {
    pub id: Uuid,
    pub payment_id: String,
    pub order_id: String,
    pub team_id: Uuid,
    pub team_slug: String,
    pub amount: i64,
    pub currency: String,
    pub status: String,
    pub description: Option<String>,
    pub success_url: Option<String>,
    pub fail_url: Option<String>,
    pub notification_url: Option<String>,
    pub email: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub authorized_at: Option<DateTime<Utc>>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub refunded_at: Option<DateTime<Utc>>,
    pub card_mask: Option<String>,
    pub receipt: Option<serde_json::Value>,
    pub metadata: Json<HashMap<String, String>>,
    pub version: i64,
}

impl TryFrom<PaymentRow> for Payment {
    type Error = StoreError;

    fn try_from(row: PaymentRow) -> Result<Self, Self::Error> {
        let currency: Currency = row
            .currency
            .parse()
            .map_err(|_| StoreError::Serialization(format!("bad currency {}", row.currency)))?;
        let status: PaymentStatus = row
            .status
            .parse()
            .map_err(|_| StoreError::Serialization(format!("bad status {}", row.status)))?;
        Ok(Payment {
            id: row.id,
            payment_id: row.payment_id,
            order_id: row.order_id,
            team_id: row.team_id,
            team_slug: row.team_slug,
            amount: row.amount,
            currency,
            status,
            description: row.description,
            success_url: row.success_url,
            fail_url: row.fail_url,
            notification_url: row.notification_url,
            email: row.email,
            expires_at: row.expires_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
            authorized_at: row.authorized_at,
            confirmed_at: row.confirmed_at,
            cancelled_at: row.cancelled_at,
            refunded_at: row.refunded_at,
            card_mask: row.card_mask,
            receipt: row.receipt,
            metadata: row.metadata.0,
            version: row.version,
        })
    }
}

#[derive(Debug, FromRow)]
pub struct TransactionRow {
    pub id: Uuid,
    pub payment_id: Uuid,
    pub tx_type: String,
    pub status: String,
    pub bank_ref: Option<String>,
    pub auth_code: Option<String>,
    pub rrn: Option<String>,
    pub response_code: Option<String>,
    pub response_message: Option<String>,
    pub amount: i64,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<TransactionRow> for Transaction {
    type Error = StoreError;

    fn try_from(row: TransactionRow) -> Result<Self, Self::Error> {
        let tx_type = match row.tx_type.as_str() {
            "AUTHORIZE" => TransactionType::Authorize,
            "CAPTURE" => TransactionType::Capture,
            "REVERSE" => TransactionType::Reverse,
            "REFUND" => TransactionType::Refund,
            other => {
                return Err(StoreError::Serialization(format!("bad tx type {other}")))
            }
        };
        let status = match row.status.as_str() {
            "PENDING" => TransactionStatus::Pending,
            "APPROVED" => TransactionStatus::Approved,
            "DECLINED" => TransactionStatus::Declined,
            "ERROR" => TransactionStatus::Error,
            other => {
                return Err(StoreError::Serialization(format!("bad tx status {other}")))
            }
        };
        Ok(Transaction {
            id: row.id,
            payment_id: row.payment_id,
            tx_type,
            status,
            bank_ref: row.bank_ref,
            auth_code: row.auth_code,
            rrn: row.rrn,
            response_code: row.response_code,
            response_message: row.response_message,
            amount: row.amount,
            created_at: row.created_at,
        })
    }
}

pub fn outcome_str(outcome: AuditOutcome) -> &'static str {
    match outcome {
        AuditOutcome::Success => "success",
        AuditOutcome::Failure => "failure",
        AuditOutcome::Warning => "warning",
    }
}
