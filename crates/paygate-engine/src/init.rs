//! Payment initialization
//!
//! Validates the signed init call, enforces amount and velocity limits,
//! and persists a fresh aggregate in `NEW` with its hosted-form URL.

use std::collections::HashMap;

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use paygate_auth::SignedFields;
use paygate_types::{
    payment::validate_order_id, AuditEntry, AuditOutcome, Currency, GatewayError, GatewayResult,
    Payment, PaymentStatus, Team, TransitionEvent,
};

use crate::metrics::{names, result_label};
use crate::PaymentEngine;

#[derive(Debug, Clone, Default)]
pub struct InitCommand {
    pub team_slug: String,
    pub token: Option<String>,
    pub amount: i64,
    pub currency: String,
    pub order_id: String,
    pub description: Option<String>,
    pub success_url: Option<String>,
    pub fail_url: Option<String>,
    pub notification_url: Option<String>,
    /// Minutes until the payment expires; config default when omitted
    pub payment_expiry_minutes: Option<i64>,
    pub email: Option<String>,
    pub language: Option<String>,
    pub items: Vec<InitItem>,
    pub receipt: Option<serde_json::Value>,
    pub data: HashMap<String, String>,
}

/// One receipt line; `amount` is the line total in minor units.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct InitItem {
    pub name: String,
    pub amount: i64,
    pub quantity: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct InitOutcome {
    pub success: bool,
    pub payment_id: String,
    pub order_id: String,
    pub status: PaymentStatus,
    #[serde(rename = "PaymentURL")]
    pub payment_url: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl PaymentEngine {
    pub async fn init(&self, cmd: InitCommand) -> GatewayResult<InitOutcome> {
        let fields = SignedFields::init(cmd.amount, &cmd.currency, &cmd.order_id, &cmd.team_slug);
        let ctx = match self
            .authenticator
            .verify_merchant("init", &cmd.team_slug, cmd.token.as_deref(), &fields)
            .await
        {
            Ok(ctx) => ctx,
            Err(e) => {
                let err = GatewayError::from(e);
                self.count_init(result_label(&err));
                return Err(err);
            }
        };
        if ctx.replayed {
            self.metrics
                .counter(names::REPLAYS, &[("op", "init".to_string())], 1);
        }

        match self.init_validated(&ctx.team, cmd).await {
            Ok(outcome) => Ok(outcome),
            Err(err) => {
                self.count_init(result_label(&err));
                self.audit(
                    AuditEntry::new(
                        format!("team:{}", ctx.team.slug),
                        "payment_init",
                        AuditOutcome::Failure,
                        self.clock.now(),
                    )
                    .with_team(&ctx.team.slug)
                    .with_detail(serde_json::json!({ "error": err.to_string() })),
                )
                .await;
                Err(err)
            }
        }
    }

    async fn init_validated(&self, team: &Team, cmd: InitCommand) -> GatewayResult<InitOutcome> {
        let currency: Currency = cmd.currency.parse()?;
        if !team.supports(currency) {
            return Err(GatewayError::validation(format!(
                "currency {currency} is not enabled for team {}",
                team.slug
            )));
        }
        if cmd.amount <= 0 {
            return Err(GatewayError::validation("Amount must be positive"));
        }
        validate_order_id(&cmd.order_id)?;

        let expiry_minutes = match cmd.payment_expiry_minutes {
            Some(minutes)
                if minutes < self.config.min_expiry_minutes
                    || minutes > self.config.max_expiry_minutes =>
            {
                return Err(GatewayError::validation(format!(
                    "PaymentExpiry must be between {} and {} minutes",
                    self.config.min_expiry_minutes, self.config.max_expiry_minutes
                )));
            }
            Some(minutes) => minutes,
            None => self.config.default_expiry_minutes,
        };

        if !cmd.items.is_empty() {
            let total: i64 = cmd.items.iter().map(|i| i.amount).sum();
            if (total - cmd.amount).abs() > 1 {
                return Err(GatewayError::validation(format!(
                    "Items total {total} does not match Amount {}",
                    cmd.amount
                )));
            }
        }

        self.check_limits(team, cmd.amount).await?;

        let now = self.clock.now();
        let mut payment = Payment::new(
            paygate_types::new_payment_id(),
            cmd.order_id.clone(),
            team.id,
            team.slug.clone(),
            cmd.amount,
            currency,
            now + Duration::minutes(expiry_minutes),
            now,
        );
        payment.description = cmd.description;
        payment.success_url = cmd.success_url;
        payment.fail_url = cmd.fail_url;
        payment.notification_url = cmd.notification_url;
        payment.email = cmd.email;
        payment.receipt = cmd.receipt;
        payment.metadata = cmd.data;
        payment.apply(TransitionEvent::Ready, now)?;

        self.store.create_payment(&payment).await?;

        info!(
            team = %team.slug,
            payment = %payment.payment_id,
            order = %payment.order_id,
            amount = payment.amount,
            "payment initialized"
        );
        self.audit(
            AuditEntry::new(
                format!("team:{}", team.slug),
                "payment_init",
                AuditOutcome::Success,
                now,
            )
            .with_team(&team.slug)
            .with_payment(&payment.payment_id)
            .with_detail(serde_json::json!({
                "amount": payment.amount,
                "currency": payment.currency,
                "orderId": payment.order_id,
            })),
        )
        .await;

        self.count_init("success");
        self.metrics
            .counter(names::INIT_AMOUNT, &[], payment.amount as u64);

        Ok(InitOutcome {
            success: true,
            payment_id: payment.payment_id.clone(),
            order_id: payment.order_id.clone(),
            status: payment.status,
            payment_url: self.payment_url(&payment.payment_id),
            expires_at: payment.expires_at,
            created_at: payment.created_at,
        })
    }

    async fn check_limits(&self, team: &Team, amount: i64) -> GatewayResult<()> {
        let min = team
            .limits
            .min_amount
            .unwrap_or(self.config.global_min_amount)
            .max(self.config.global_min_amount);
        let max = team
            .limits
            .max_amount
            .unwrap_or(self.config.global_max_amount)
            .min(self.config.global_max_amount);
        if amount < min {
            return Err(GatewayError::LimitExceeded(format!(
                "Amount {amount} is below the minimum of {min}"
            )));
        }
        if amount > max {
            return Err(GatewayError::LimitExceeded(format!(
                "Amount {amount} exceeds the maximum of {max}"
            )));
        }

        let now = self.clock.now();
        let day_start = now
            .date_naive()
            .and_hms_opt(0, 0, 0)
            .expect("midnight is valid")
            .and_utc();

        if let Some(cap) = team.limits.daily_amount {
            let spent = self.store.team_amount_since(team.id, day_start).await?;
            if spent + amount > cap {
                return Err(GatewayError::LimitExceeded(format!(
                    "daily amount limit of {cap} would be exceeded"
                )));
            }
        }
        if let Some(cap) = team.limits.daily_count {
            let count = self.store.team_count_since(team.id, day_start).await?;
            if count + 1 > cap {
                return Err(GatewayError::LimitExceeded(format!(
                    "daily transaction limit of {cap} would be exceeded"
                )));
            }
        }
        if let Some(cap) = team.limits.monthly_amount {
            let month_start = NaiveDate::from_ymd_opt(now.year(), now.month(), 1)
                .expect("first of month is valid")
                .and_hms_opt(0, 0, 0)
                .expect("midnight is valid")
                .and_utc();
            let spent = self.store.team_amount_since(team.id, month_start).await?;
            if spent + amount > cap {
                return Err(GatewayError::LimitExceeded(format!(
                    "monthly amount limit of {cap} would be exceeded"
                )));
            }
        }
        Ok(())
    }

    pub(crate) fn payment_url(&self, payment_id: &str) -> String {
        format!(
            "{}/api/v1/paymentform/render/{payment_id}",
            self.config.public_base_url.trim_end_matches('/')
        )
    }

    fn count_init(&self, result: &str) {
        self.metrics
            .counter(names::INIT_REQUESTS, &[("result", result.to_string())], 1);
    }
}
