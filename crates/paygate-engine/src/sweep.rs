//! Expiry sweep
//!
//! Periodic background pass over non-terminal payments whose deadline
//! has lapsed. Pre-authorization states expire to `EXPIRED`; payments
//! stuck in the authorization phase past the bank deadline go to
//! `DEADLINE_EXPIRED`. The sweep uses the same optimistic writes as
//! live traffic, so racing a merchant call just means losing a version
//! check and skipping the row.

use serde::Serialize;
use tracing::{info, warn};

use paygate_store::StoreError;
use paygate_types::{
    AuditEntry, AuditOutcome, GatewayResult, PaymentStatus, TransitionEvent,
};

use crate::metrics::names;
use crate::PaymentEngine;

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct SweepStats {
    pub scanned: usize,
    pub expired: usize,
    pub deadline_expired: usize,
    pub conflicts: usize,
}

impl PaymentEngine {
    /// One sweep pass. Idempotent and safe to run concurrently with
    /// merchant traffic and with other sweep instances.
    pub async fn run_expiry_sweep(&self) -> GatewayResult<SweepStats> {
        let now = self.clock.now();
        let due = self
            .store
            .expired_payments(now, self.config.sweep_batch)
            .await?;

        let mut stats = SweepStats::default();
        for mut payment in due {
            stats.scanned += 1;

            let event = match payment.status {
                PaymentStatus::Authorizing | PaymentStatus::Authorized => {
                    TransitionEvent::DeadlineExpire
                }
                _ => TransitionEvent::Expire,
            };
            if payment.apply(event, now).is_err() {
                // Raced into a terminal state since the scan.
                continue;
            }

            match self.store.update_payment(&payment).await {
                Ok(stored) => {
                    self.invalidate(&stored);
                    let kind = match stored.status {
                        PaymentStatus::DeadlineExpired => {
                            stats.deadline_expired += 1;
                            "deadline"
                        }
                        _ => {
                            stats.expired += 1;
                            "form"
                        }
                    };
                    self.metrics.counter(
                        names::EXPIRED,
                        &[("kind", kind.to_string())],
                        1,
                    );
                    self.audit(
                        AuditEntry::new("system", "payment_expire", AuditOutcome::Success, now)
                            .with_team(&stored.team_slug)
                            .with_payment(&stored.payment_id)
                            .with_detail(serde_json::json!({ "status": stored.status })),
                    )
                    .await;

                    if let Ok(Some(team)) = self.store.team_by_id(stored.team_id).await {
                        self.notify_terminal(&team, &stored);
                    }
                }
                Err(StoreError::Conflict(_)) => {
                    stats.conflicts += 1;
                }
                Err(e) => {
                    warn!(
                        payment = %payment.payment_id,
                        error = %e,
                        "expiry write failed, leaving for the next pass"
                    );
                }
            }
        }

        if stats.scanned > 0 {
            info!(
                scanned = stats.scanned,
                expired = stats.expired,
                deadline_expired = stats.deadline_expired,
                conflicts = stats.conflicts,
                "expiry sweep pass complete"
            );
        }
        self.metrics
            .gauge(names::CACHE_ENTRIES, &[], self.cache.len() as f64);
        Ok(stats)
    }
}
