//! Hosted card form
//!
//! The cardholder-facing half of the lifecycle. The GET resolves the
//! payment and moves `INIT|NEW -> FORM_SHOWED`; anything else renders
//! an informational status page without mutating. The POST validates
//! card input, runs `FORM_SHOWED -> AUTHORIZING -> AUTHORIZED|REJECTED`
//! around the adapter call, and hands back the redirect target. Raw
//! card data lives only on the stack of this module.

use serde::Serialize;
use tracing::{info, warn};

use paygate_bank::AuthorizeOutcome;
use paygate_types::{
    AuditEntry, AuditOutcome, Currency, GatewayError, GatewayResult, Payment, PaymentStatus,
    Transaction, TransactionStatus, TransactionType, TransitionEvent,
};

use crate::card::{validate_card, CardForm};
use crate::metrics::names;
use crate::PaymentEngine;

/// Data for the card-entry template
#[derive(Debug, Clone, Serialize)]
pub struct FormView {
    pub payment_id: String,
    pub order_id: String,
    pub amount: i64,
    pub currency: Currency,
    pub description: Option<String>,
}

/// Data for the informational status template
#[derive(Debug, Clone, Serialize)]
pub struct StatusView {
    pub payment_id: String,
    pub order_id: String,
    pub status: PaymentStatus,
    pub amount: i64,
    pub currency: Currency,
    pub message: String,
}

#[derive(Debug, Clone)]
pub enum RenderOutcome {
    Form(FormView),
    Status(StatusView),
}

#[derive(Clone)]
pub struct SubmitCommand {
    pub payment_id: String,
    pub card: CardForm,
}

#[derive(Debug, Clone)]
pub struct SubmitOutcome {
    pub payment_id: String,
    pub status: PaymentStatus,
    /// Merchant redirect when configured; the internal result page
    /// otherwise.
    pub redirect_url: Option<String>,
}

/// Cardholder-facing description of a status
pub fn status_message(status: PaymentStatus) -> &'static str {
    match status {
        PaymentStatus::Init | PaymentStatus::New => "The payment is awaiting card details.",
        PaymentStatus::FormShowed => "The payment form has already been opened.",
        PaymentStatus::Authorizing | PaymentStatus::Processing => {
            "The payment is being processed."
        }
        PaymentStatus::Authorized | PaymentStatus::Confirming => {
            "The payment has been authorized."
        }
        PaymentStatus::Confirmed | PaymentStatus::Completed | PaymentStatus::Captured => {
            "The payment completed successfully."
        }
        PaymentStatus::AuthFail | PaymentStatus::Rejected | PaymentStatus::Failed => {
            "The payment was declined."
        }
        PaymentStatus::Cancelled => "The payment was cancelled.",
        PaymentStatus::Refunded | PaymentStatus::PartiallyRefunded => {
            "The payment was refunded."
        }
        PaymentStatus::Expired | PaymentStatus::DeadlineExpired => "The payment has expired.",
    }
}

fn status_view(payment: &Payment) -> StatusView {
    StatusView {
        payment_id: payment.payment_id.clone(),
        order_id: payment.order_id.clone(),
        status: payment.status,
        amount: payment.amount,
        currency: payment.currency,
        message: status_message(payment.status).to_string(),
    }
}

impl PaymentEngine {
    /// Hosted form GET.
    pub async fn render_form(&self, payment_id: &str) -> GatewayResult<RenderOutcome> {
        let mut payment = self
            .store
            .payment_by_public_id_any_team(payment_id)
            .await?
            .ok_or_else(|| GatewayError::not_found(format!("payment {payment_id} not found")))?;

        if !matches!(payment.status, PaymentStatus::Init | PaymentStatus::New) {
            return Ok(RenderOutcome::Status(status_view(&payment)));
        }

        let now = self.clock.now();
        payment.apply(TransitionEvent::FormShow, now)?;
        let payment = match self.store.update_payment(&payment).await {
            Ok(stored) => stored,
            Err(paygate_store::StoreError::Conflict(_)) => {
                // Someone else moved the payment between our read and
                // write; show whatever state won.
                let reloaded = self
                    .store
                    .payment_by_public_id_any_team(payment_id)
                    .await?
                    .ok_or_else(|| {
                        GatewayError::not_found(format!("payment {payment_id} not found"))
                    })?;
                if reloaded.status != PaymentStatus::FormShowed {
                    return Ok(RenderOutcome::Status(status_view(&reloaded)));
                }
                reloaded
            }
            Err(e) => return Err(e.into()),
        };
        self.invalidate(&payment);

        Ok(RenderOutcome::Form(FormView {
            payment_id: payment.payment_id.clone(),
            order_id: payment.order_id.clone(),
            amount: payment.amount,
            currency: payment.currency,
            description: payment.description.clone(),
        }))
    }

    /// Hosted form POST.
    pub async fn submit_form(&self, cmd: SubmitCommand) -> GatewayResult<SubmitOutcome> {
        if cmd.card.card_number.trim().is_empty()
            || cmd.card.exp_date.trim().is_empty()
            || cmd.card.cvv.trim().is_empty()
        {
            return Err(GatewayError::validation(
                "card number, expiry and CVV are required",
            ));
        }

        let mut payment = self
            .store
            .payment_by_public_id_any_team(&cmd.payment_id)
            .await?
            .ok_or_else(|| {
                GatewayError::not_found(format!("payment {} not found", cmd.payment_id))
            })?;

        let now = self.clock.now();
        let card = validate_card(&cmd.card, now)?;

        if payment.status != PaymentStatus::FormShowed {
            return Err(GatewayError::invalid_state(format!(
                "payment {} in status {} cannot accept card details",
                payment.payment_id, payment.status
            )));
        }

        let team = self
            .store
            .team_by_id(payment.team_id)
            .await?
            .ok_or_else(|| GatewayError::internal("payment references a missing team"))?;

        payment.apply(TransitionEvent::AuthStart, now)?;
        let mut claimed = self.store.update_payment(&payment).await?;

        match self
            .bank
            .authorize(&card, claimed.amount, claimed.currency)
            .await
        {
            Ok(AuthorizeOutcome::Approved(auth)) => {
                let now = self.clock.now();
                claimed.apply(TransitionEvent::AuthOk, now)?;
                claimed.card_mask = Some(auth.masked_pan.clone());
                let stored = self.store.update_payment(&claimed).await?;

                let mut tx = Transaction::new(
                    stored.id,
                    TransactionType::Authorize,
                    TransactionStatus::Approved,
                    stored.amount,
                    now,
                );
                tx.bank_ref = Some(auth.bank_ref);
                tx.auth_code = Some(auth.auth_code);
                tx.rrn = Some(auth.rrn);
                self.store.append_transaction(&tx).await?;

                self.invalidate(&stored);
                info!(payment = %stored.payment_id, "payment authorized");
                self.audit(
                    AuditEntry::new(
                        format!("team:{}", stored.team_slug),
                        "payment_authorize",
                        AuditOutcome::Success,
                        now,
                    )
                    .with_team(&stored.team_slug)
                    .with_payment(&stored.payment_id)
                    .with_detail(serde_json::json!({ "cardMask": auth.masked_pan })),
                )
                .await;
                self.count_authorization("approved");

                Ok(SubmitOutcome {
                    payment_id: stored.payment_id.clone(),
                    status: stored.status,
                    redirect_url: stored
                        .success_url
                        .clone()
                        .or_else(|| team.success_url.clone()),
                })
            }
            Ok(AuthorizeOutcome::Declined { code, message }) => {
                let now = self.clock.now();
                claimed.apply(TransitionEvent::Reject, now)?;
                claimed
                    .metadata
                    .insert("rejectionCode".to_string(), code.clone());
                claimed
                    .metadata
                    .insert("rejectionMessage".to_string(), message.clone());
                let stored = self.store.update_payment(&claimed).await?;

                let mut tx = Transaction::new(
                    stored.id,
                    TransactionType::Authorize,
                    TransactionStatus::Declined,
                    stored.amount,
                    now,
                );
                tx.response_code = Some(code.clone());
                tx.response_message = Some(message.clone());
                self.store.append_transaction(&tx).await?;

                self.invalidate(&stored);
                info!(payment = %stored.payment_id, code, "authorization declined");
                self.audit(
                    AuditEntry::new(
                        format!("team:{}", stored.team_slug),
                        "payment_authorize",
                        AuditOutcome::Failure,
                        now,
                    )
                    .with_team(&stored.team_slug)
                    .with_payment(&stored.payment_id)
                    .with_detail(serde_json::json!({ "code": code, "message": message })),
                )
                .await;
                self.count_authorization("declined");
                self.notify_terminal(&team, &stored);

                Ok(SubmitOutcome {
                    payment_id: stored.payment_id.clone(),
                    status: stored.status,
                    redirect_url: stored.fail_url.clone().or_else(|| team.fail_url.clone()),
                })
            }
            Err(bank_err) => {
                // The payment stays parked in AUTHORIZING; the expiry
                // sweep or a later poll resolves it.
                warn!(
                    payment = %claimed.payment_id,
                    error = %bank_err,
                    "authorization call failed"
                );
                let mut tx = Transaction::new(
                    claimed.id,
                    TransactionType::Authorize,
                    TransactionStatus::Error,
                    claimed.amount,
                    self.clock.now(),
                );
                tx.response_message = Some(bank_err.to_string());
                self.store.append_transaction(&tx).await?;
                self.count_authorization("error");
                Err(GatewayError::AdapterFailure(bank_err.to_string()))
            }
        }
    }

    /// Internal result/status page.
    pub async fn result_view(&self, payment_id: &str) -> GatewayResult<StatusView> {
        let payment = self
            .store
            .payment_by_public_id_any_team(payment_id)
            .await?
            .ok_or_else(|| GatewayError::not_found(format!("payment {payment_id} not found")))?;
        Ok(status_view(&payment))
    }

    fn count_authorization(&self, result: &str) {
        self.metrics.counter(
            names::AUTHORIZATIONS,
            &[("result", result.to_string())],
            1,
        );
    }
}
