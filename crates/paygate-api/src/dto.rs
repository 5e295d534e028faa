//! Wire DTOs
//!
//! Request bodies use the PascalCase field names of the public API.
//! Response bodies are the engine outcome structs serialized as-is, so
//! cached idempotent replays stay byte-identical.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use paygate_engine::cancel::CancelCommand;
use paygate_engine::check::CheckCommand;
use paygate_engine::confirm::ConfirmCommand;
use paygate_engine::init::{InitCommand, InitItem};
use paygate_engine::team_ops::RegisterCommand;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct InitRequest {
    pub team_slug: String,
    pub token: Option<String>,
    pub amount: i64,
    pub currency: String,
    pub order_id: String,
    pub description: Option<String>,
    #[serde(rename = "SuccessURL")]
    pub success_url: Option<String>,
    #[serde(rename = "FailURL")]
    pub fail_url: Option<String>,
    #[serde(rename = "NotificationURL")]
    pub notification_url: Option<String>,
    /// Minutes until expiry, 5..=43200
    pub payment_expiry: Option<i64>,
    pub email: Option<String>,
    pub language: Option<String>,
    #[serde(default)]
    pub items: Vec<InitItem>,
    pub receipt: Option<serde_json::Value>,
    #[serde(default)]
    pub data: HashMap<String, String>,
}

impl From<InitRequest> for InitCommand {
    fn from(req: InitRequest) -> Self {
        InitCommand {
            team_slug: req.team_slug,
            token: req.token,
            amount: req.amount,
            currency: req.currency,
            order_id: req.order_id,
            description: req.description,
            success_url: req.success_url,
            fail_url: req.fail_url,
            notification_url: req.notification_url,
            payment_expiry_minutes: req.payment_expiry,
            email: req.email,
            language: req.language,
            items: req.items,
            receipt: req.receipt,
            data: req.data,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ConfirmRequest {
    pub team_slug: String,
    pub token: Option<String>,
    pub payment_id: String,
    pub amount: Option<i64>,
    pub description: Option<String>,
    #[serde(default)]
    pub data: HashMap<String, String>,
}

impl From<ConfirmRequest> for ConfirmCommand {
    fn from(req: ConfirmRequest) -> Self {
        ConfirmCommand {
            team_slug: req.team_slug,
            token: req.token,
            payment_id: req.payment_id,
            amount: req.amount,
            description: req.description,
            data: req.data,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CancelRequest {
    pub team_slug: String,
    pub token: Option<String>,
    pub payment_id: String,
    pub amount: Option<i64>,
    #[serde(default)]
    pub data: HashMap<String, String>,
}

impl From<CancelRequest> for CancelCommand {
    fn from(req: CancelRequest) -> Self {
        CancelCommand {
            team_slug: req.team_slug,
            token: req.token,
            payment_id: req.payment_id,
            amount: req.amount,
            data: req.data,
        }
    }
}

/// Shared by the POST body and the GET query string
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CheckRequest {
    pub team_slug: String,
    pub token: Option<String>,
    pub payment_id: Option<String>,
    pub order_id: Option<String>,
    #[serde(default)]
    pub include_card: bool,
    #[serde(default)]
    pub include_transactions: bool,
    #[serde(default)]
    pub include_customer: bool,
    #[serde(default)]
    pub include_receipt: bool,
    pub language: Option<String>,
}

impl From<CheckRequest> for CheckCommand {
    fn from(req: CheckRequest) -> Self {
        CheckCommand {
            team_slug: req.team_slug,
            token: req.token,
            payment_id: req.payment_id,
            order_id: req.order_id,
            include_card: req.include_card,
            include_transactions: req.include_transactions,
            include_customer: req.include_customer,
            include_receipt: req.include_receipt,
            language: req.language,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RegisterRequest {
    pub team_slug: String,
    pub name: String,
    pub password: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    #[serde(rename = "SuccessURL")]
    pub success_url: Option<String>,
    #[serde(rename = "FailURL")]
    pub fail_url: Option<String>,
    #[serde(rename = "NotificationURL")]
    pub notification_url: Option<String>,
    #[serde(rename = "CancelURL")]
    pub cancel_url: Option<String>,
    #[serde(default)]
    pub supported_currencies: Vec<String>,
}

impl From<RegisterRequest> for RegisterCommand {
    fn from(req: RegisterRequest) -> Self {
        RegisterCommand {
            slug: req.team_slug,
            name: req.name,
            password: req.password,
            email: req.email,
            phone: req.phone,
            success_url: req.success_url,
            fail_url: req.fail_url,
            notification_url: req.notification_url,
            cancel_url: req.cancel_url,
            supported_currencies: req.supported_currencies,
        }
    }
}

/// Hosted form POST body
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SubmitFormRequest {
    pub payment_id: String,
    pub card_number: String,
    pub exp_date: String,
    pub cvv: String,
    pub holder: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct HealthResponse {
    pub status: String,
    pub store: bool,
    pub uptime_secs: u64,
}
