//! Status queries
//!
//! Lookup by payment id (precedence) or order id, served from the
//! response cache when a live entry exists. Entries holding only
//! terminal payments get the long TTL; anything still in flight gets
//! the short one. 404 only when the authenticated team has no matching
//! payments at all.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::error;

use paygate_auth::SignedFields;
use paygate_cache::{keys, CacheTags};
use paygate_types::{
    Currency, GatewayError, GatewayResult, Payment, PaymentStatus, TransactionStatus,
    TransactionType,
};

use crate::metrics::{names, result_label};
use crate::PaymentEngine;

#[derive(Debug, Clone, Default)]
pub struct CheckCommand {
    pub team_slug: String,
    pub token: Option<String>,
    pub payment_id: Option<String>,
    pub order_id: Option<String>,
    pub include_card: bool,
    pub include_transactions: bool,
    pub include_customer: bool,
    pub include_receipt: bool,
    pub language: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TransactionInfo {
    #[serde(rename = "Type")]
    pub tx_type: TransactionType,
    pub status: TransactionStatus,
    pub amount: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bank_ref: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rrn: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PaymentInfo {
    pub payment_id: String,
    pub order_id: String,
    pub status: PaymentStatus,
    pub amount: i64,
    pub currency: Currency,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub card_mask: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receipt: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transactions: Option<Vec<TransactionInfo>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CheckOutcome {
    pub success: bool,
    pub payments: Vec<PaymentInfo>,
}

impl PaymentEngine {
    pub async fn check(&self, cmd: CheckCommand) -> GatewayResult<CheckOutcome> {
        let (subject, fields) = match (&cmd.payment_id, &cmd.order_id) {
            (Some(pid), _) => (
                pid.clone(),
                SignedFields::payment_op(&cmd.team_slug, pid, None),
            ),
            (None, Some(oid)) => (oid.clone(), SignedFields::order_op(&cmd.team_slug, oid)),
            (None, None) => {
                let err = GatewayError::validation("PaymentId or OrderId is required");
                self.count_check(result_label(&err), "miss");
                return Err(err);
            }
        };

        let ctx = match self
            .authenticator
            .verify_merchant("check", &cmd.team_slug, cmd.token.as_deref(), &fields)
            .await
        {
            Ok(ctx) => ctx,
            Err(e) => {
                let err = GatewayError::from(e);
                self.count_check(result_label(&err), "miss");
                return Err(err);
            }
        };
        let team = ctx.team;

        let flags = format!(
            "{}{}{}{}",
            cmd.include_card as u8,
            cmd.include_transactions as u8,
            cmd.include_customer as u8,
            cmd.include_receipt as u8
        );
        let lang = cmd.language.as_deref().unwrap_or("");
        let cache_key = keys::check(team.id, &subject, &flags, lang);

        if let Some(cached) = self.cache.get(&cache_key) {
            if let Ok(outcome) = serde_json::from_str::<CheckOutcome>(&cached) {
                self.count_check("success", "hit");
                return Ok(outcome);
            }
        }

        let payments = match &cmd.payment_id {
            Some(pid) => self
                .store
                .payment_by_public_id(team.id, pid)
                .await?
                .into_iter()
                .collect::<Vec<_>>(),
            None => {
                self.store
                    .payments_by_order(team.id, cmd.order_id.as_deref().unwrap_or_default())
                    .await?
            }
        };
        if payments.is_empty() {
            let err = GatewayError::not_found(format!("no payments found for {subject}"));
            self.count_check(result_label(&err), "miss");
            return Err(err);
        }

        let all_terminal = payments.iter().all(|p| p.status.is_terminal());
        let mut infos = Vec::with_capacity(payments.len());
        for payment in &payments {
            infos.push(self.payment_info(payment, &cmd).await?);
        }

        let outcome = CheckOutcome {
            success: true,
            payments: infos,
        };

        let ttl = if all_terminal {
            self.config.ttls.check_terminal
        } else {
            self.config.ttls.check_active
        };
        let tags = CacheTags {
            team_id: team.id,
            payment_id: cmd.payment_id.clone(),
            order_id: Some(
                cmd.order_id
                    .clone()
                    .unwrap_or_else(|| payments[0].order_id.clone()),
            ),
        };
        match serde_json::to_string(&outcome) {
            Ok(body) => self.cache.put(cache_key, body, ttl, Some(tags)),
            Err(e) => error!(error = %e, "failed to serialize check response"),
        }

        self.count_check("success", "miss");
        Ok(outcome)
    }

    async fn payment_info(
        &self,
        payment: &Payment,
        cmd: &CheckCommand,
    ) -> GatewayResult<PaymentInfo> {
        let transactions = if cmd.include_transactions {
            let txs = self.store.transactions_for_payment(payment.id).await?;
            Some(
                txs.into_iter()
                    .map(|t| TransactionInfo {
                        tx_type: t.tx_type,
                        status: t.status,
                        amount: t.amount,
                        bank_ref: t.bank_ref,
                        auth_code: t.auth_code,
                        rrn: t.rrn,
                        created_at: t.created_at,
                    })
                    .collect(),
            )
        } else {
            None
        };

        Ok(PaymentInfo {
            payment_id: payment.payment_id.clone(),
            order_id: payment.order_id.clone(),
            status: payment.status,
            amount: payment.amount,
            currency: payment.currency,
            created_at: payment.created_at,
            updated_at: payment.updated_at,
            expires_at: payment.expires_at,
            description: payment.description.clone(),
            card_mask: cmd.include_card.then(|| payment.card_mask.clone()).flatten(),
            email: cmd
                .include_customer
                .then(|| payment.email.clone())
                .flatten(),
            receipt: cmd
                .include_receipt
                .then(|| payment.receipt.clone())
                .flatten(),
            transactions,
        })
    }

    fn count_check(&self, result: &str, cache: &str) {
        self.metrics.counter(
            names::CHECK_REQUESTS,
            &[
                ("result", result.to_string()),
                ("cache", cache.to_string()),
            ],
            1,
        );
    }
}
