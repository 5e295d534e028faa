//! Paygate lifecycle engine
//!
//! The authenticated request pipeline behind every payment operation:
//! validate the signed call, run the idempotent state transition over
//! the persisted aggregate under optimistic concurrency, call the bank
//! adapter where the operation demands it, keep the status cache
//! coherent, and emit metrics and audit entries throughout.
//!
//! The engine owns no I/O of its own; everything arrives through narrow
//! injected seams (store, adapter, cache, authenticator, metrics sink,
//! webhook sender, clock), wired explicitly by the server binary.

pub mod cancel;
pub mod card;
pub mod check;
pub mod config;
pub mod confirm;
pub mod form;
pub mod init;
pub mod metrics;
pub mod sweep;
pub mod team_ops;
pub mod webhook;

use std::sync::Arc;
use std::time::Duration as StdDuration;

use tracing::error;

use paygate_auth::Authenticator;
use paygate_bank::BankAdapter;
use paygate_cache::ResponseCache;
use paygate_store::Store;
use paygate_types::{
    AuditEntry, Clock, GatewayError, GatewayResult, Payment, Team, TransactionStatus,
    TransactionType,
};

pub use card::{luhn_valid, validate_card, CardForm};
pub use config::EngineConfig;
pub use metrics::{FacadeSink, MetricsSink, RecordingSink};
pub use webhook::{HttpWebhookSender, RecordingSender, WebhookEvent, WebhookSender};

pub struct PaymentEngine {
    store: Arc<dyn Store>,
    bank: Arc<dyn BankAdapter>,
    cache: Arc<ResponseCache>,
    authenticator: Arc<Authenticator>,
    metrics: Arc<dyn MetricsSink>,
    webhooks: Arc<dyn WebhookSender>,
    clock: Arc<dyn Clock>,
    config: EngineConfig,
}

impl PaymentEngine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<dyn Store>,
        bank: Arc<dyn BankAdapter>,
        cache: Arc<ResponseCache>,
        authenticator: Arc<Authenticator>,
        metrics: Arc<dyn MetricsSink>,
        webhooks: Arc<dyn WebhookSender>,
        clock: Arc<dyn Clock>,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            bank,
            cache,
            authenticator,
            metrics,
            webhooks,
            clock,
            config,
        }
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    pub fn cache(&self) -> &Arc<ResponseCache> {
        &self.cache
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Best-effort audit append; an audit failure never fails the
    /// operation it describes.
    pub(crate) async fn audit(&self, entry: AuditEntry) {
        if let Err(e) = self.store.append_audit(&entry).await {
            error!(action = %entry.action, error = %e, "failed to append audit entry");
        }
    }

    /// Drop every cached status overlapping the mutated payment.
    pub(crate) fn invalidate(&self, payment: &Payment) {
        self.cache
            .invalidate_payment(payment.team_id, &payment.payment_id, &payment.order_id);
    }

    /// Bank reference of the most recent approved transaction of one of
    /// the given types; required before capture/release/refund calls.
    pub(crate) async fn bank_reference(
        &self,
        payment: &Payment,
        types: &[TransactionType],
    ) -> GatewayResult<String> {
        let txs = self.store.transactions_for_payment(payment.id).await?;
        txs.iter()
            .rev()
            .find(|t| types.contains(&t.tx_type) && t.status == TransactionStatus::Approved)
            .and_then(|t| t.bank_ref.clone())
            .ok_or_else(|| {
                GatewayError::internal(format!(
                    "missing bank reference for payment {}",
                    payment.payment_id
                ))
            })
    }

    /// Fire a terminal-status webhook when the team opted in.
    pub(crate) fn notify_terminal(&self, team: &Team, payment: &Payment) {
        if !team.features.webhooks || !payment.status.is_terminal() {
            return;
        }
        let Some(url) = payment
            .notification_url
            .clone()
            .or_else(|| team.notification_url.clone())
        else {
            return;
        };

        let event = WebhookEvent {
            payment_id: payment.payment_id.clone(),
            order_id: payment.order_id.clone(),
            team_slug: team.slug.clone(),
            status: payment.status,
            amount: payment.amount,
            currency: payment.currency,
            occurred_at: self.clock.now(),
        };
        let sender = self.webhooks.clone();
        let secret = team.secret.clone();
        let timeout = StdDuration::from_secs(team.features.webhook_timeout_secs);
        let retries = team.features.webhook_retries;
        let sink = self.metrics.clone();
        tokio::spawn(async move {
            sender.send(&url, &event, &secret, timeout, retries).await;
            sink.counter(
                crate::metrics::names::WEBHOOKS,
                &[("status", event.status.as_str().to_string())],
                1,
            );
        });
    }
}
