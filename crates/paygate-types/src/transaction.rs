//! Bank-adapter call records
//!
//! One row per adapter call, append-only. Rows are never updated after
//! reaching a terminal status.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Adapter operation type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    Authorize,
    Capture,
    Reverse,
    Refund,
}

impl TransactionType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Authorize => "AUTHORIZE",
            Self::Capture => "CAPTURE",
            Self::Reverse => "REVERSE",
            Self::Refund => "REFUND",
        }
    }
}

/// Adapter call outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    Pending,
    Approved,
    Declined,
    Error,
}

impl TransactionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Approved => "APPROVED",
            Self::Declined => "DECLINED",
            Self::Error => "ERROR",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    /// Internal payment row id
    pub payment_id: Uuid,
    pub tx_type: TransactionType,
    pub status: TransactionStatus,
    pub bank_ref: Option<String>,
    pub auth_code: Option<String>,
    pub rrn: Option<String>,
    pub response_code: Option<String>,
    pub response_message: Option<String>,
    pub amount: i64,
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    pub fn new(
        payment_id: Uuid,
        tx_type: TransactionType,
        status: TransactionStatus,
        amount: i64,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            payment_id,
            tx_type,
            status,
            bank_ref: None,
            auth_code: None,
            rrn: None,
            response_code: None,
            response_message: None,
            amount,
            created_at: now,
        }
    }
}
