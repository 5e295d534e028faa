//! Cancel / reverse / refund
//!
//! One caller-facing operation; the engine picks the actual type from
//! the current status: full cancellation before authorization, full
//! reversal of an uncaptured hold, full refund after capture. Partial
//! amounts are not supported in this version; a caller-supplied partial
//! amount yields a warning and the full operation runs.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use paygate_auth::SignedFields;
use paygate_cache::keys;
use paygate_types::{
    AuditEntry, AuditOutcome, GatewayError, GatewayResult, Payment, PaymentStatus, Team,
    Transaction, TransactionStatus, TransactionType, TransitionEvent,
};

use crate::metrics::{names, result_label};
use crate::PaymentEngine;

#[derive(Debug, Clone, Default)]
pub struct CancelCommand {
    pub team_slug: String,
    pub token: Option<String>,
    pub payment_id: String,
    /// Ignored except for the partial-amount warning
    pub amount: Option<i64>,
    pub data: HashMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CancelOperation {
    FullCancellation,
    FullReversal,
    FullRefund,
}

impl CancelOperation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::FullCancellation => "FULL_CANCELLATION",
            Self::FullReversal => "FULL_REVERSAL",
            Self::FullRefund => "FULL_REFUND",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CancelOutcome {
    pub success: bool,
    pub payment_id: String,
    pub order_id: String,
    pub status: PaymentStatus,
    pub operation: CancelOperation,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

impl PaymentEngine {
    pub async fn cancel(&self, cmd: CancelCommand) -> GatewayResult<CancelOutcome> {
        let fields = SignedFields::payment_op(&cmd.team_slug, &cmd.payment_id, cmd.amount);
        let ctx = match self
            .authenticator
            .verify_merchant("cancel", &cmd.team_slug, cmd.token.as_deref(), &fields)
            .await
        {
            Ok(ctx) => ctx,
            Err(e) => {
                let err = GatewayError::from(e);
                self.count_cancel(result_label(&err), None);
                return Err(err);
            }
        };
        if ctx.replayed {
            self.metrics
                .counter(names::REPLAYS, &[("op", "cancel".to_string())], 1);
        }
        let team = ctx.team;

        let external_request_id = cmd.data.get("externalRequestId").cloned();
        if let Some(rid) = &external_request_id {
            if let Some(cached) = self.cache.get(&keys::cancel(team.id, rid)) {
                if let Ok(outcome) = serde_json::from_str::<CancelOutcome>(&cached) {
                    self.metrics.counter(
                        names::IDEMPOTENT_HITS,
                        &[("scope", "cancel".to_string())],
                        1,
                    );
                    return Ok(outcome);
                }
            }
        }

        match self.cancel_inner(&team, &cmd).await {
            Ok(outcome) => {
                if let Some(rid) = external_request_id {
                    match serde_json::to_string(&outcome) {
                        Ok(body) => self.cache.put(
                            keys::cancel(team.id, &rid),
                            body,
                            self.config.ttls.mutation,
                            None,
                        ),
                        Err(e) => error!(error = %e, "failed to serialize cancel response"),
                    }
                }
                Ok(outcome)
            }
            Err(err) => {
                self.count_cancel(result_label(&err), None);
                self.audit(
                    AuditEntry::new(
                        format!("team:{}", team.slug),
                        "payment_cancel",
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

    async fn cancel_inner(&self, team: &Team, cmd: &CancelCommand) -> GatewayResult<CancelOutcome> {
        let mut payment = self
            .store
            .payment_by_public_id(team.id, &cmd.payment_id)
            .await?
            .ok_or_else(|| {
                GatewayError::not_found(format!("payment {} not found", cmd.payment_id))
            })?;

        let warning = match cmd.amount {
            Some(amount) if amount != payment.amount => Some(format!(
                "partial operations are not supported; the full amount {} was processed",
                payment.amount
            )),
            _ => None,
        };
        if warning.is_some() {
            warn!(
                payment = %payment.payment_id,
                "partial cancel amount ignored, performing full operation"
            );
        }

        let now = self.clock.now();
        let operation = match payment.status {
            PaymentStatus::Init | PaymentStatus::New => {
                payment.apply(TransitionEvent::Cancel, now)?;
                CancelOperation::FullCancellation
            }
            PaymentStatus::Authorized => {
                if !team.features.reversals {
                    return Err(GatewayError::Forbidden(
                        "reversals are not enabled for this team".into(),
                    ));
                }
                let bank_ref = self
                    .bank_reference(&payment, &[TransactionType::Authorize])
                    .await?;
                if let Err(bank_err) = self.bank.release(&bank_ref).await {
                    self.record_adapter_error(
                        &payment,
                        TransactionType::Reverse,
                        &bank_err.to_string(),
                    )
                    .await?;
                    return Err(GatewayError::AdapterFailure(bank_err.to_string()));
                }
                payment.apply(TransitionEvent::Reverse, now)?;
                let mut tx = Transaction::new(
                    payment.id,
                    TransactionType::Reverse,
                    TransactionStatus::Approved,
                    payment.amount,
                    now,
                );
                tx.bank_ref = Some(bank_ref);
                self.store.append_transaction(&tx).await?;
                CancelOperation::FullReversal
            }
            PaymentStatus::Confirmed | PaymentStatus::Captured | PaymentStatus::Completed => {
                if !team.features.refunds {
                    return Err(GatewayError::Forbidden(
                        "refunds are not enabled for this team".into(),
                    ));
                }
                let bank_ref = self
                    .bank_reference(
                        &payment,
                        &[TransactionType::Capture, TransactionType::Authorize],
                    )
                    .await?;
                let receipt = match self.bank.refund(&bank_ref, payment.amount).await {
                    Ok(receipt) => receipt,
                    Err(bank_err) => {
                        self.record_adapter_error(
                            &payment,
                            TransactionType::Refund,
                            &bank_err.to_string(),
                        )
                        .await?;
                        return Err(GatewayError::AdapterFailure(bank_err.to_string()));
                    }
                };
                payment.apply(TransitionEvent::RefundFull, now)?;
                let mut tx = Transaction::new(
                    payment.id,
                    TransactionType::Refund,
                    TransactionStatus::Approved,
                    payment.amount,
                    now,
                );
                tx.bank_ref = Some(receipt.refund_ref);
                self.store.append_transaction(&tx).await?;
                CancelOperation::FullRefund
            }
            status => {
                return Err(GatewayError::invalid_state(format!(
                    "payment {} in status {status} cannot be cancelled",
                    payment.payment_id
                )));
            }
        };

        let stored = self.store.update_payment(&payment).await?;
        self.invalidate(&stored);

        info!(
            team = %team.slug,
            payment = %stored.payment_id,
            operation = operation.as_str(),
            "payment cancelled"
        );
        self.audit(
            AuditEntry::new(
                format!("team:{}", team.slug),
                "payment_cancel",
                AuditOutcome::Success,
                now,
            )
            .with_team(&team.slug)
            .with_payment(&stored.payment_id)
            .with_detail(serde_json::json!({
                "operation": operation.as_str(),
                "amount": stored.amount,
            })),
        )
        .await;
        self.count_cancel("success", Some(operation));
        self.notify_terminal(team, &stored);

        Ok(CancelOutcome {
            success: true,
            payment_id: stored.payment_id.clone(),
            order_id: stored.order_id.clone(),
            status: stored.status,
            operation,
            warning,
        })
    }

    async fn record_adapter_error(
        &self,
        payment: &Payment,
        tx_type: TransactionType,
        message: &str,
    ) -> GatewayResult<()> {
        let mut tx = Transaction::new(
            payment.id,
            tx_type,
            TransactionStatus::Error,
            payment.amount,
            self.clock.now(),
        );
        tx.response_message = Some(message.to_string());
        self.store.append_transaction(&tx).await?;
        Ok(())
    }

    fn count_cancel(&self, result: &str, operation: Option<CancelOperation>) {
        let mut labels = vec![("result", result.to_string())];
        if let Some(op) = operation {
            labels.push(("operation", op.as_str().to_string()));
        }
        self.metrics.counter(names::CANCEL_REQUESTS, &labels, 1);
    }
}
