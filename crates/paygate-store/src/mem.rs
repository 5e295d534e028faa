//! In-process store
//!
//! Backs tests and single-node development mode. Per-payment write
//! linearization comes from the dashmap shard lock held across the
//! compare-and-swap in `update_payment`.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use uuid::Uuid;

use paygate_types::{AuditEntry, Payment, Team, Transaction};

use crate::error::{StoreError, StoreResult};
use crate::Store;

#[derive(Default)]
pub struct MemStore {
    teams: DashMap<Uuid, Team>,
    team_slugs: DashMap<String, Uuid>,
    payments: DashMap<Uuid, Payment>,
    /// public payment id -> internal row id
    payment_ids: DashMap<String, Uuid>,
    transactions: DashMap<Uuid, Vec<Transaction>>,
    audit: Mutex<Vec<AuditEntry>>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the audit log, oldest first. Test helper.
    pub fn audit_entries(&self) -> Vec<AuditEntry> {
        self.audit.lock().expect("audit lock poisoned").clone()
    }
}

#[async_trait]
impl Store for MemStore {
    async fn create_team(&self, team: &Team) -> StoreResult<()> {
        if self.team_slugs.contains_key(&team.slug) {
            return Err(StoreError::Duplicate(format!(
                "team slug {} already exists",
                team.slug
            )));
        }
        self.team_slugs.insert(team.slug.clone(), team.id);
        self.teams.insert(team.id, team.clone());
        Ok(())
    }

    async fn team_by_slug(&self, slug: &str) -> StoreResult<Option<Team>> {
        Ok(self
            .team_slugs
            .get(slug)
            .and_then(|id| self.teams.get(&id).map(|t| t.clone())))
    }

    async fn team_by_id(&self, id: Uuid) -> StoreResult<Option<Team>> {
        Ok(self.teams.get(&id).map(|t| t.clone()))
    }

    async fn update_team(&self, team: &Team) -> StoreResult<()> {
        match self.teams.get_mut(&team.id) {
            Some(mut stored) => {
                *stored = team.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound(format!("team {}", team.slug))),
        }
    }

    async fn record_failed_auth(&self, slug: &str) -> StoreResult<i32> {
        let id = *self
            .team_slugs
            .get(slug)
            .ok_or_else(|| StoreError::NotFound(format!("team {slug}")))?;
        let mut team = self
            .teams
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("team {slug}")))?;
        team.failed_auth_attempts += 1;
        Ok(team.failed_auth_attempts)
    }

    async fn lock_team(&self, slug: &str, until: DateTime<Utc>) -> StoreResult<()> {
        let id = *self
            .team_slugs
            .get(slug)
            .ok_or_else(|| StoreError::NotFound(format!("team {slug}")))?;
        if let Some(mut team) = self.teams.get_mut(&id) {
            team.locked_until = Some(until);
        }
        Ok(())
    }

    async fn reset_failed_auth(&self, slug: &str) -> StoreResult<()> {
        let id = *self
            .team_slugs
            .get(slug)
            .ok_or_else(|| StoreError::NotFound(format!("team {slug}")))?;
        if let Some(mut team) = self.teams.get_mut(&id) {
            team.failed_auth_attempts = 0;
            team.locked_until = None;
        }
        Ok(())
    }

    async fn create_payment(&self, payment: &Payment) -> StoreResult<()> {
        if self.payment_ids.contains_key(&payment.payment_id) {
            return Err(StoreError::Duplicate(format!(
                "payment {} already exists",
                payment.payment_id
            )));
        }
        self.payment_ids.insert(payment.payment_id.clone(), payment.id);
        self.payments.insert(payment.id, payment.clone());
        Ok(())
    }

    async fn payment_by_public_id(
        &self,
        team_id: Uuid,
        payment_id: &str,
    ) -> StoreResult<Option<Payment>> {
        Ok(self
            .payment_ids
            .get(payment_id)
            .and_then(|id| self.payments.get(&id).map(|p| p.clone()))
            .filter(|p| p.team_id == team_id))
    }

    async fn payment_by_public_id_any_team(
        &self,
        payment_id: &str,
    ) -> StoreResult<Option<Payment>> {
        Ok(self
            .payment_ids
            .get(payment_id)
            .and_then(|id| self.payments.get(&id).map(|p| p.clone())))
    }

    async fn payments_by_order(
        &self,
        team_id: Uuid,
        order_id: &str,
    ) -> StoreResult<Vec<Payment>> {
        let mut found: Vec<Payment> = self
            .payments
            .iter()
            .filter(|p| p.team_id == team_id && p.order_id == order_id)
            .map(|p| p.clone())
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(found)
    }

    async fn update_payment(&self, payment: &Payment) -> StoreResult<Payment> {
        let mut stored = self
            .payments
            .get_mut(&payment.id)
            .ok_or_else(|| StoreError::NotFound(format!("payment {}", payment.payment_id)))?;
        if stored.version != payment.version {
            return Err(StoreError::Conflict(format!(
                "payment {} was modified concurrently (expected version {}, found {})",
                payment.payment_id, payment.version, stored.version
            )));
        }
        let mut next = payment.clone();
        next.version += 1;
        *stored = next.clone();
        Ok(next)
    }

    async fn expired_payments(
        &self,
        now: DateTime<Utc>,
        limit: i64,
    ) -> StoreResult<Vec<Payment>> {
        let mut due: Vec<Payment> = self
            .payments
            .iter()
            .filter(|p| p.is_expired(now))
            .map(|p| p.clone())
            .collect();
        due.sort_by(|a, b| a.expires_at.cmp(&b.expires_at));
        due.truncate(limit.max(0) as usize);
        Ok(due)
    }

    async fn team_amount_since(&self, team_id: Uuid, since: DateTime<Utc>) -> StoreResult<i64> {
        Ok(self
            .payments
            .iter()
            .filter(|p| p.team_id == team_id && p.created_at >= since)
            .map(|p| p.amount)
            .sum())
    }

    async fn team_count_since(&self, team_id: Uuid, since: DateTime<Utc>) -> StoreResult<i64> {
        Ok(self
            .payments
            .iter()
            .filter(|p| p.team_id == team_id && p.created_at >= since)
            .count() as i64)
    }

    async fn append_transaction(&self, tx: &Transaction) -> StoreResult<()> {
        self.transactions
            .entry(tx.payment_id)
            .or_default()
            .push(tx.clone());
        Ok(())
    }

    async fn transactions_for_payment(
        &self,
        payment_id: Uuid,
    ) -> StoreResult<Vec<Transaction>> {
        let mut txs = self
            .transactions
            .get(&payment_id)
            .map(|v| v.clone())
            .unwrap_or_default();
        txs.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(txs)
    }

    async fn append_audit(&self, entry: &AuditEntry) -> StoreResult<()> {
        self.audit
            .lock()
            .expect("audit lock poisoned")
            .push(entry.clone());
        Ok(())
    }

    async fn health_check(&self) -> StoreResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use paygate_types::{Currency, FeeConfig, TeamFeatures, TeamLimits};
    use std::collections::HashMap;

    fn team(slug: &str) -> Team {
        let now = Utc::now();
        Team {
            id: Uuid::new_v4(),
            slug: slug.into(),
            name: slug.to_uppercase(),
            secret: "terminal-key".into(),
            password_hash: "$argon2id$stub".into(),
            email: None,
            phone: None,
            success_url: None,
            fail_url: None,
            notification_url: None,
            cancel_url: None,
            supported_currencies: vec![Currency::RUB],
            limits: TeamLimits::default(),
            features: TeamFeatures::default(),
            fees: FeeConfig::default(),
            metadata: HashMap::new(),
            failed_auth_attempts: 0,
            locked_until: None,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    fn payment(team: &Team, order_id: &str) -> Payment {
        let now = Utc::now();
        Payment::new(
            paygate_types::new_payment_id(),
            order_id.into(),
            team.id,
            team.slug.clone(),
            150_000,
            Currency::RUB,
            now + Duration::minutes(15),
            now,
        )
    }

    #[tokio::test]
    async fn slug_uniqueness() {
        let store = MemStore::new();
        store.create_team(&team("acme")).await.unwrap();
        let err = store.create_team(&team("acme")).await.unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(_)));
    }

    #[tokio::test]
    async fn version_conflict_loses_cleanly() {
        let store = MemStore::new();
        let t = team("acme");
        store.create_team(&t).await.unwrap();
        let p = payment(&t, "order-1");
        store.create_payment(&p).await.unwrap();

        // Two loads at version 1, two racing writes.
        let mut first = store
            .payment_by_public_id(t.id, &p.payment_id)
            .await
            .unwrap()
            .unwrap();
        let mut second = first.clone();

        first.description = Some("winner".into());
        let stored = store.update_payment(&first).await.unwrap();
        assert_eq!(stored.version, 2);

        second.description = Some("loser".into());
        let err = store.update_payment(&second).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));

        let reloaded = store
            .payment_by_public_id(t.id, &p.payment_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(reloaded.description.as_deref(), Some("winner"));
    }

    #[tokio::test]
    async fn order_id_may_repeat() {
        let store = MemStore::new();
        let t = team("acme");
        store.create_team(&t).await.unwrap();
        store.create_payment(&payment(&t, "order-1")).await.unwrap();
        store.create_payment(&payment(&t, "order-1")).await.unwrap();

        let found = store.payments_by_order(t.id, "order-1").await.unwrap();
        assert_eq!(found.len(), 2);
    }

    #[tokio::test]
    async fn payment_scoped_to_team() {
        let store = MemStore::new();
        let ours = team("acme");
        let theirs = team("rival");
        store.create_team(&ours).await.unwrap();
        store.create_team(&theirs).await.unwrap();
        let p = payment(&ours, "order-1");
        store.create_payment(&p).await.unwrap();

        assert!(store
            .payment_by_public_id(ours.id, &p.payment_id)
            .await
            .unwrap()
            .is_some());
        assert!(store
            .payment_by_public_id(theirs.id, &p.payment_id)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn lockout_bookkeeping() {
        let store = MemStore::new();
        let t = team("acme");
        store.create_team(&t).await.unwrap();

        assert_eq!(store.record_failed_auth("acme").await.unwrap(), 1);
        assert_eq!(store.record_failed_auth("acme").await.unwrap(), 2);
        store
            .lock_team("acme", Utc::now() + Duration::minutes(15))
            .await
            .unwrap();
        assert!(store
            .team_by_slug("acme")
            .await
            .unwrap()
            .unwrap()
            .is_locked(Utc::now()));

        store.reset_failed_auth("acme").await.unwrap();
        let reloaded = store.team_by_slug("acme").await.unwrap().unwrap();
        assert_eq!(reloaded.failed_auth_attempts, 0);
        assert!(reloaded.locked_until.is_none());
    }

    #[tokio::test]
    async fn expired_scan_skips_terminal() {
        let store = MemStore::new();
        let t = team("acme");
        store.create_team(&t).await.unwrap();

        let now = Utc::now();
        let mut live = payment(&t, "order-1");
        live.expires_at = now - Duration::minutes(1);
        store.create_payment(&live).await.unwrap();

        let mut done = payment(&t, "order-2");
        done.expires_at = now - Duration::minutes(1);
        done.status = paygate_types::PaymentStatus::Cancelled;
        store.create_payment(&done).await.unwrap();

        let due = store.expired_payments(now, 100).await.unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].payment_id, live.payment_id);
    }
}
