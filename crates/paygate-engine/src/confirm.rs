//! Payment confirmation (capture)
//!
//! Only a full capture of the authorized amount is supported. The
//! `AUTHORIZED -> CONFIRMING` write is the concurrency gate: of two
//! racing confirms exactly one wins the version check and reaches the
//! adapter; the loser surfaces `conflict` with no side effect. An
//! adapter error rolls the payment back to `AUTHORIZED` under a new
//! version and is never retried within the request.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use paygate_auth::SignedFields;
use paygate_cache::keys;
use paygate_types::{
    AuditEntry, AuditOutcome, GatewayError, GatewayResult, PaymentStatus, Transaction,
    TransactionStatus, TransactionType, TransitionEvent,
};

use crate::metrics::{names, result_label};
use crate::PaymentEngine;

#[derive(Debug, Clone, Default)]
pub struct ConfirmCommand {
    pub team_slug: String,
    pub token: Option<String>,
    pub payment_id: String,
    /// When present, must equal the authorized amount
    pub amount: Option<i64>,
    pub description: Option<String>,
    pub data: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ConfirmOutcome {
    pub success: bool,
    pub payment_id: String,
    pub order_id: String,
    pub status: PaymentStatus,
    pub amount: i64,
}

impl PaymentEngine {
    pub async fn confirm(&self, cmd: ConfirmCommand) -> GatewayResult<ConfirmOutcome> {
        let fields = SignedFields::payment_op(&cmd.team_slug, &cmd.payment_id, cmd.amount);
        let ctx = match self
            .authenticator
            .verify_merchant("confirm", &cmd.team_slug, cmd.token.as_deref(), &fields)
            .await
        {
            Ok(ctx) => ctx,
            Err(e) => {
                let err = GatewayError::from(e);
                self.count_confirm(result_label(&err));
                return Err(err);
            }
        };
        if ctx.replayed {
            self.metrics
                .counter(names::REPLAYS, &[("op", "confirm".to_string())], 1);
        }
        let team = ctx.team;

        // Idempotent replay: same key within TTL returns the stored
        // response without touching the adapter.
        let idempotency_key = cmd.data.get("idempotencyKey").cloned();
        if let Some(key) = &idempotency_key {
            if let Some(cached) = self.cache.get(&keys::confirm(team.id, key)) {
                if let Ok(outcome) = serde_json::from_str::<ConfirmOutcome>(&cached) {
                    self.metrics.counter(
                        names::IDEMPOTENT_HITS,
                        &[("scope", "confirm".to_string())],
                        1,
                    );
                    return Ok(outcome);
                }
            }
        }

        let result = self.confirm_inner(&team, &cmd).await;
        match result {
            Ok(outcome) => {
                if let Some(key) = idempotency_key {
                    match serde_json::to_string(&outcome) {
                        Ok(body) => self.cache.put(
                            keys::confirm(team.id, &key),
                            body,
                            self.config.ttls.mutation,
                            None,
                        ),
                        Err(e) => error!(error = %e, "failed to serialize confirm response"),
                    }
                }
                Ok(outcome)
            }
            Err(err) => {
                self.count_confirm(result_label(&err));
                self.audit(
                    AuditEntry::new(
                        format!("team:{}", team.slug),
                        "payment_confirm",
                        AuditOutcome::Failure,
                        self.clock.now(),
                    )
                    .with_team(&team.slug)
                    .with_payment(&cmd.payment_id)
                    .with_detail(serde_json::json!({ "error": err.to_string() })),
                )
                .await;
                Err(err)
            }
        }
    }

    async fn confirm_inner(
        &self,
        team: &paygate_types::Team,
        cmd: &ConfirmCommand,
    ) -> GatewayResult<ConfirmOutcome> {
        let mut payment = self
            .store
            .payment_by_public_id(team.id, &cmd.payment_id)
            .await?
            .ok_or_else(|| {
                GatewayError::not_found(format!("payment {} not found", cmd.payment_id))
            })?;

        if let Some(amount) = cmd.amount {
            if amount != payment.amount {
                return Err(GatewayError::validation(format!(
                    "Amount {amount} must equal the authorized amount {}; partial confirmation is not supported",
                    payment.amount
                )));
            }
        }

        let bank_ref = self
            .bank_reference(&payment, &[TransactionType::Authorize])
            .await;

        // Claim the payment. Losing a race here means a concurrent
        // confirm is in flight; the caller retries with a fresh read.
        let now = self.clock.now();
        if let Some(description) = &cmd.description {
            payment.description = Some(description.clone());
        }
        payment.apply(TransitionEvent::ConfirmStart, now)?;
        let mut claimed = self.store.update_payment(&payment).await?;

        let bank_ref = match bank_ref {
            Ok(bank_ref) => bank_ref,
            Err(e) => {
                // No authorization on file; release the claim.
                self.rollback_confirm(&mut claimed).await;
                return Err(e);
            }
        };

        match self.bank.capture(&bank_ref, claimed.amount).await {
            Ok(receipt) => {
                let now = self.clock.now();
                claimed.apply(TransitionEvent::ConfirmOk, now)?;
                let confirmed = self.store.update_payment(&claimed).await?;

                let mut tx = Transaction::new(
                    confirmed.id,
                    TransactionType::Capture,
                    TransactionStatus::Approved,
                    confirmed.amount,
                    now,
                );
                tx.bank_ref = Some(receipt.bank_ref);
                self.store.append_transaction(&tx).await?;

                self.invalidate(&confirmed);
                info!(
                    team = %team.slug,
                    payment = %confirmed.payment_id,
                    amount = confirmed.amount,
                    "payment confirmed"
                );
                self.audit(
                    AuditEntry::new(
                        format!("team:{}", team.slug),
                        "payment_confirm",
                        AuditOutcome::Success,
                        now,
                    )
                    .with_team(&team.slug)
                    .with_payment(&confirmed.payment_id)
                    .with_detail(serde_json::json!({ "amount": confirmed.amount })),
                )
                .await;
                self.count_confirm("success");
                self.notify_terminal(team, &confirmed);

                Ok(ConfirmOutcome {
                    success: true,
                    payment_id: confirmed.payment_id.clone(),
                    order_id: confirmed.order_id.clone(),
                    status: confirmed.status,
                    amount: confirmed.amount,
                })
            }
            Err(bank_err) => {
                warn!(
                    payment = %claimed.payment_id,
                    error = %bank_err,
                    "capture failed, rolling payment back to AUTHORIZED"
                );
                let now = self.clock.now();
                let mut tx = Transaction::new(
                    claimed.id,
                    TransactionType::Capture,
                    TransactionStatus::Error,
                    claimed.amount,
                    now,
                );
                tx.response_message = Some(bank_err.to_string());
                self.store.append_transaction(&tx).await?;

                self.rollback_confirm(&mut claimed).await;
                self.invalidate(&claimed);
                Err(GatewayError::AdapterFailure(bank_err.to_string()))
            }
        }
    }

    /// `CONFIRMING -> AUTHORIZED` under a new version. A conflict here
    /// means the expiry sweep or an operator already moved the payment;
    /// the reload path will observe whatever won.
    async fn rollback_confirm(&self, payment: &mut paygate_types::Payment) {
        let now = self.clock.now();
        if payment.apply(TransitionEvent::ConfirmRollback, now).is_err() {
            return;
        }
        if let Err(e) = self.store.update_payment(payment).await {
            error!(
                payment = %payment.payment_id,
                error = %e,
                "failed to roll back confirm claim"
            );
        }
    }

    fn count_confirm(&self, result: &str) {
        self.metrics.counter(
            names::CONFIRM_REQUESTS,
            &[("result", result.to_string())],
            1,
        );
    }
}
