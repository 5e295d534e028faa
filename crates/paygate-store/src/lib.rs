//! Paygate persistence layer
//!
//! One [`Store`] trait covers teams, payments, transactions and the
//! audit log. Two implementations ship: [`PgStore`] over PostgreSQL
//! (sqlx, hand-written queries) and [`MemStore`], an in-process store
//! used by tests and single-node development mode.
//!
//! Writes to a payment are linearized through its `version` column:
//! `update_payment` applies `WHERE version = expected` and bumps it; a
//! zero-row update surfaces as [`StoreError::Conflict`].

pub mod error;
pub mod mem;
pub mod models;
pub mod pg;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use paygate_types::{AuditEntry, Payment, Team, Transaction};

pub use error::{StoreError, StoreResult};
pub use mem::MemStore;
pub use pg::PgStore;

/// Persistence seam for the lifecycle engine and auth layer
#[async_trait]
pub trait Store: Send + Sync {
    // -------------------------------------------------------------------------
    // Teams
    // -------------------------------------------------------------------------

    /// Insert a new team; `Duplicate` if the slug is taken.
    async fn create_team(&self, team: &Team) -> StoreResult<()>;

    async fn team_by_slug(&self, slug: &str) -> StoreResult<Option<Team>>;

    async fn team_by_id(&self, id: Uuid) -> StoreResult<Option<Team>>;

    /// Full-row team update (admin limit edits, URL changes).
    async fn update_team(&self, team: &Team) -> StoreResult<()>;

    /// Increment the failed-auth counter, returning the new count.
    async fn record_failed_auth(&self, slug: &str) -> StoreResult<i32>;

    /// Set the lockout window after the threshold is exceeded.
    async fn lock_team(&self, slug: &str, until: DateTime<Utc>) -> StoreResult<()>;

    /// Clear the counter and any lockout after a successful verification.
    async fn reset_failed_auth(&self, slug: &str) -> StoreResult<()>;

    // -------------------------------------------------------------------------
    // Payments
    // -------------------------------------------------------------------------

    /// Insert a new payment; `Duplicate` if `(team_id, payment_id)` exists.
    async fn create_payment(&self, payment: &Payment) -> StoreResult<()>;

    async fn payment_by_public_id(
        &self,
        team_id: Uuid,
        payment_id: &str,
    ) -> StoreResult<Option<Payment>>;

    /// Lookup without a team scope; used by the hosted form, which is
    /// reached by the cardholder, not the merchant.
    async fn payment_by_public_id_any_team(
        &self,
        payment_id: &str,
    ) -> StoreResult<Option<Payment>>;

    /// All payments for a merchant order reference, newest first.
    async fn payments_by_order(&self, team_id: Uuid, order_id: &str)
        -> StoreResult<Vec<Payment>>;

    /// Optimistic write: applies the row `WHERE version = payment.version`,
    /// bumps the version, and returns the stored aggregate. A zero-row
    /// update means a concurrent writer won and yields `Conflict`.
    async fn update_payment(&self, payment: &Payment) -> StoreResult<Payment>;

    /// Non-terminal payments whose `expires_at` has passed.
    async fn expired_payments(&self, now: DateTime<Utc>, limit: i64)
        -> StoreResult<Vec<Payment>>;

    /// Sum of created payment amounts for a team since `since` (velocity caps).
    async fn team_amount_since(&self, team_id: Uuid, since: DateTime<Utc>) -> StoreResult<i64>;

    /// Count of created payments for a team since `since`.
    async fn team_count_since(&self, team_id: Uuid, since: DateTime<Utc>) -> StoreResult<i64>;

    // -------------------------------------------------------------------------
    // Transactions & audit
    // -------------------------------------------------------------------------

    /// Append-only adapter-call record.
    async fn append_transaction(&self, tx: &Transaction) -> StoreResult<()>;

    /// Transactions for a payment ordered by `created_at`.
    async fn transactions_for_payment(&self, payment_id: Uuid)
        -> StoreResult<Vec<Transaction>>;

    /// Append-only audit record.
    async fn append_audit(&self, entry: &AuditEntry) -> StoreResult<()>;

    // -------------------------------------------------------------------------
    // Ops
    // -------------------------------------------------------------------------

    async fn health_check(&self) -> StoreResult<()>;
}
