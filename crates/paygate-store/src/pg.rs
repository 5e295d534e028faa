//! PostgreSQL store
//!
//! Hand-written queries over a `PgPool`. Optimistic concurrency on
//! payments is a single-row `UPDATE … WHERE id = $1 AND version = $2`;
//! a zero-row result is reported as `Conflict` and never retried here.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::types::Json;
use tracing::info;
use uuid::Uuid;

use paygate_types::{AuditEntry, Payment, Team, Transaction};

use crate::error::{StoreError, StoreResult};
use crate::models::{outcome_str, PaymentRow, TeamRow, TransactionRow};
use crate::Store;

const PAYMENT_COLUMNS: &str = "id, payment_id, order_id, team_id, team_slug, amount, currency, \
     status, description, success_url, fail_url, notification_url, email, expires_at, created_at, \
     updated_at, authorized_at, confirmed_at, cancelled_at, refunded_at, card_mask, receipt, \
     metadata, version";

const TEAM_COLUMNS: &str = "id, slug, name, secret, password_hash, email, phone, success_url, \
     fail_url, notification_url, cancel_url, supported_currencies, limits, features, fees, \
     metadata, failed_auth_attempts, locked_until, is_active, created_at, updated_at";

/// Table bootstrap, applied idempotently at startup.
const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS teams (
        id UUID PRIMARY KEY,
        slug TEXT NOT NULL UNIQUE,
        name TEXT NOT NULL,
        secret TEXT NOT NULL,
        password_hash TEXT NOT NULL,
        email TEXT,
        phone TEXT,
        success_url TEXT,
        fail_url TEXT,
        notification_url TEXT,
        cancel_url TEXT,
        supported_currencies JSONB NOT NULL,
        limits JSONB NOT NULL,
        features JSONB NOT NULL,
        fees JSONB NOT NULL,
        metadata JSONB NOT NULL,
        failed_auth_attempts INT NOT NULL DEFAULT 0,
        locked_until TIMESTAMPTZ,
        is_active BOOLEAN NOT NULL DEFAULT TRUE,
        created_at TIMESTAMPTZ NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS payments (
        id UUID PRIMARY KEY,
        payment_id TEXT NOT NULL,
        order_id TEXT NOT NULL,
        team_id UUID NOT NULL REFERENCES teams(id),
        team_slug TEXT NOT NULL,
        amount BIGINT NOT NULL,
        currency TEXT NOT NULL,
        status TEXT NOT NULL,
        description TEXT,
        success_url TEXT,
        fail_url TEXT,
        notification_url TEXT,
        email TEXT,
        expires_at TIMESTAMPTZ NOT NULL,
        created_at TIMESTAMPTZ NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL,
        authorized_at TIMESTAMPTZ,
        confirmed_at TIMESTAMPTZ,
        cancelled_at TIMESTAMPTZ,
        refunded_at TIMESTAMPTZ,
        card_mask TEXT,
        receipt JSONB,
        metadata JSONB NOT NULL,
        version BIGINT NOT NULL DEFAULT 1,
        CONSTRAINT payments_team_id_payment_id_key UNIQUE (team_id, payment_id)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS payments_order_idx ON payments (team_id, order_id)",
    "CREATE INDEX IF NOT EXISTS payments_expiry_idx ON payments (expires_at) WHERE status NOT IN \
     ('CONFIRMED','COMPLETED','CAPTURED','REJECTED','CANCELLED','REFUNDED','AUTH_FAIL','FAILED','EXPIRED','DEADLINE_EXPIRED')",
    r#"
    CREATE TABLE IF NOT EXISTS transactions (
        id UUID PRIMARY KEY,
        payment_id UUID NOT NULL REFERENCES payments(id),
        tx_type TEXT NOT NULL,
        status TEXT NOT NULL,
        bank_ref TEXT,
        auth_code TEXT,
        rrn TEXT,
        response_code TEXT,
        response_message TEXT,
        amount BIGINT NOT NULL,
        created_at TIMESTAMPTZ NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS transactions_payment_idx ON transactions (payment_id, created_at)",
    r#"
    CREATE TABLE IF NOT EXISTS audit_log (
        id UUID PRIMARY KEY,
        ts TIMESTAMPTZ NOT NULL,
        actor TEXT NOT NULL,
        action TEXT NOT NULL,
        payment_id TEXT,
        team_slug TEXT,
        outcome TEXT NOT NULL,
        detail JSONB NOT NULL
    )
    "#,
];

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connect and bootstrap the schema.
    pub async fn connect(url: &str, max_connections: u32) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
            .map_err(|e| StoreError::Connection(format!("postgres: {e}")))?;
        info!("connected to postgres");

        for stmt in SCHEMA {
            sqlx::query(stmt).execute(&pool).await?;
        }
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    fn duplicate_from(e: sqlx::Error, what: &str) -> StoreError {
        if let sqlx::Error::Database(ref db_err) = e {
            if db_err.constraint().is_some() {
                return StoreError::Duplicate(format!("{what} already exists"));
            }
        }
        StoreError::Query(e)
    }
}

#[async_trait]
impl Store for PgStore {
    async fn create_team(&self, team: &Team) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO teams (
                id, slug, name, secret, password_hash, email, phone,
                success_url, fail_url, notification_url, cancel_url,
                supported_currencies, limits, features, fees, metadata,
                failed_auth_attempts, locked_until, is_active, created_at, updated_at
            )
            VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$15,$16,$17,$18,$19,$20,$21)
            "#,
        )
        .bind(team.id)
        .bind(&team.slug)
        .bind(&team.name)
        .bind(&team.secret)
        .bind(&team.password_hash)
        .bind(&team.email)
        .bind(&team.phone)
        .bind(&team.success_url)
        .bind(&team.fail_url)
        .bind(&team.notification_url)
        .bind(&team.cancel_url)
        .bind(Json(&team.supported_currencies))
        .bind(Json(&team.limits))
        .bind(Json(&team.features))
        .bind(Json(&team.fees))
        .bind(Json(&team.metadata))
        .bind(team.failed_auth_attempts)
        .bind(team.locked_until)
        .bind(team.is_active)
        .bind(team.created_at)
        .bind(team.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| Self::duplicate_from(e, &format!("team slug {}", team.slug)))?;
        Ok(())
    }

    async fn team_by_slug(&self, slug: &str) -> StoreResult<Option<Team>> {
        let row = sqlx::query_as::<_, TeamRow>(&format!(
            "SELECT {TEAM_COLUMNS} FROM teams WHERE slug = $1"
        ))
        .bind(slug)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Team::from))
    }

    async fn team_by_id(&self, id: Uuid) -> StoreResult<Option<Team>> {
        let row = sqlx::query_as::<_, TeamRow>(&format!(
            "SELECT {TEAM_COLUMNS} FROM teams WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Team::from))
    }

    async fn update_team(&self, team: &Team) -> StoreResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE teams SET
                name = $2, email = $3, phone = $4,
                success_url = $5, fail_url = $6, notification_url = $7, cancel_url = $8,
                supported_currencies = $9, limits = $10, features = $11, fees = $12,
                metadata = $13, is_active = $14, updated_at = $15
            WHERE id = $1
            "#,
        )
        .bind(team.id)
        .bind(&team.name)
        .bind(&team.email)
        .bind(&team.phone)
        .bind(&team.success_url)
        .bind(&team.fail_url)
        .bind(&team.notification_url)
        .bind(&team.cancel_url)
        .bind(Json(&team.supported_currencies))
        .bind(Json(&team.limits))
        .bind(Json(&team.features))
        .bind(Json(&team.fees))
        .bind(Json(&team.metadata))
        .bind(team.is_active)
        .bind(team.updated_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("team {}", team.slug)));
        }
        Ok(())
    }

    async fn record_failed_auth(&self, slug: &str) -> StoreResult<i32> {
        let count: Option<i32> = sqlx::query_scalar(
            "UPDATE teams SET failed_auth_attempts = failed_auth_attempts + 1 \
             WHERE slug = $1 RETURNING failed_auth_attempts",
        )
        .bind(slug)
        .fetch_optional(&self.pool)
        .await?;
        count.ok_or_else(|| StoreError::NotFound(format!("team {slug}")))
    }

    async fn lock_team(&self, slug: &str, until: DateTime<Utc>) -> StoreResult<()> {
        sqlx::query("UPDATE teams SET locked_until = $2 WHERE slug = $1")
            .bind(slug)
            .bind(until)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn reset_failed_auth(&self, slug: &str) -> StoreResult<()> {
        sqlx::query(
            "UPDATE teams SET failed_auth_attempts = 0, locked_until = NULL WHERE slug = $1",
        )
        .bind(slug)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn create_payment(&self, payment: &Payment) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO payments (
                id, payment_id, order_id, team_id, team_slug, amount, currency, status,
                description, success_url, fail_url, notification_url, email, expires_at,
                created_at, updated_at, authorized_at, confirmed_at, cancelled_at,
                refunded_at, card_mask, receipt, metadata, version
            )
            VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$15,$16,$17,$18,$19,$20,$21,$22,$23,$24)
            "#,
        )
        .bind(payment.id)
        .bind(&payment.payment_id)
        .bind(&payment.order_id)
        .bind(payment.team_id)
        .bind(&payment.team_slug)
        .bind(payment.amount)
        .bind(payment.currency.as_str())
        .bind(payment.status.as_str())
        .bind(&payment.description)
        .bind(&payment.success_url)
        .bind(&payment.fail_url)
        .bind(&payment.notification_url)
        .bind(&payment.email)
        .bind(payment.expires_at)
        .bind(payment.created_at)
        .bind(payment.updated_at)
        .bind(payment.authorized_at)
        .bind(payment.confirmed_at)
        .bind(payment.cancelled_at)
        .bind(payment.refunded_at)
        .bind(&payment.card_mask)
        .bind(&payment.receipt)
        .bind(Json(&payment.metadata))
        .bind(payment.version)
        .execute(&self.pool)
        .await
        .map_err(|e| Self::duplicate_from(e, &format!("payment {}", payment.payment_id)))?;
        Ok(())
    }

    async fn payment_by_public_id(
        &self,
        team_id: Uuid,
        payment_id: &str,
    ) -> StoreResult<Option<Payment>> {
        let row = sqlx::query_as::<_, PaymentRow>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE team_id = $1 AND payment_id = $2"
        ))
        .bind(team_id)
        .bind(payment_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Payment::try_from).transpose()
    }

    async fn payment_by_public_id_any_team(
        &self,
        payment_id: &str,
    ) -> StoreResult<Option<Payment>> {
        let row = sqlx::query_as::<_, PaymentRow>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE payment_id = $1"
        ))
        .bind(payment_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Payment::try_from).transpose()
    }

    async fn payments_by_order(
        &self,
        team_id: Uuid,
        order_id: &str,
    ) -> StoreResult<Vec<Payment>> {
        let rows = sqlx::query_as::<_, PaymentRow>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments \
             WHERE team_id = $1 AND order_id = $2 ORDER BY created_at DESC"
        ))
        .bind(team_id)
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Payment::try_from).collect()
    }

    async fn update_payment(&self, payment: &Payment) -> StoreResult<Payment> {
        let row = sqlx::query_as::<_, PaymentRow>(&format!(
            r#"
            UPDATE payments SET
                status = $3, description = $4, updated_at = $5,
                authorized_at = $6, confirmed_at = $7, cancelled_at = $8, refunded_at = $9,
                card_mask = $10, receipt = $11, metadata = $12, expires_at = $13,
                version = version + 1
            WHERE id = $1 AND version = $2
            RETURNING {PAYMENT_COLUMNS}
            "#
        ))
        .bind(payment.id)
        .bind(payment.version)
        .bind(payment.status.as_str())
        .bind(&payment.description)
        .bind(payment.updated_at)
        .bind(payment.authorized_at)
        .bind(payment.confirmed_at)
        .bind(payment.cancelled_at)
        .bind(payment.refunded_at)
        .bind(&payment.card_mask)
        .bind(&payment.receipt)
        .bind(Json(&payment.metadata))
        .bind(payment.expires_at)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Payment::try_from(row),
            None => Err(StoreError::Conflict(format!(
                "payment {} was modified concurrently (expected version {})",
                payment.payment_id, payment.version
            ))),
        }
    }

    async fn expired_payments(
        &self,
        now: DateTime<Utc>,
        limit: i64,
    ) -> StoreResult<Vec<Payment>> {
        let rows = sqlx::query_as::<_, PaymentRow>(&format!(
            r#"
            SELECT {PAYMENT_COLUMNS} FROM payments
            WHERE expires_at <= $1
              AND status NOT IN ('CONFIRMED','COMPLETED','CAPTURED','REJECTED','CANCELLED',
                                 'REFUNDED','AUTH_FAIL','FAILED','EXPIRED','DEADLINE_EXPIRED')
            ORDER BY expires_at ASC
            LIMIT $2
            "#
        ))
        .bind(now)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Payment::try_from).collect()
    }

    async fn team_amount_since(&self, team_id: Uuid, since: DateTime<Utc>) -> StoreResult<i64> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(amount), 0)::BIGINT FROM payments \
             WHERE team_id = $1 AND created_at >= $2",
        )
        .bind(team_id)
        .bind(since)
        .fetch_one(&self.pool)
        .await?;
        Ok(total)
    }

    async fn team_count_since(&self, team_id: Uuid, since: DateTime<Utc>) -> StoreResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM payments WHERE team_id = $1 AND created_at >= $2",
        )
        .bind(team_id)
        .bind(since)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    async fn append_transaction(&self, tx: &Transaction) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO transactions (
                id, payment_id, tx_type, status, bank_ref, auth_code, rrn,
                response_code, response_message, amount, created_at
            )
            VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11)
            "#,
        )
        .bind(tx.id)
        .bind(tx.payment_id)
        .bind(tx.tx_type.as_str())
        .bind(tx.status.as_str())
        .bind(&tx.bank_ref)
        .bind(&tx.auth_code)
        .bind(&tx.rrn)
        .bind(&tx.response_code)
        .bind(&tx.response_message)
        .bind(tx.amount)
        .bind(tx.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn transactions_for_payment(
        &self,
        payment_id: Uuid,
    ) -> StoreResult<Vec<Transaction>> {
        let rows = sqlx::query_as::<_, TransactionRow>(
            "SELECT id, payment_id, tx_type, status, bank_ref, auth_code, rrn, \
             response_code, response_message, amount, created_at \
             FROM transactions WHERE payment_id = $1 ORDER BY created_at ASC",
        )
        .bind(payment_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Transaction::try_from).collect()
    }

    async fn append_audit(&self, entry: &AuditEntry) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO audit_log (id, ts, actor, action, payment_id, team_slug, outcome, detail) \
             VALUES ($1,$2,$3,$4,$5,$6,$7,$8)",
        )
        .bind(entry.id)
        .bind(entry.timestamp)
        .bind(&entry.actor)
        .bind(&entry.action)
        .bind(&entry.payment_id)
        .bind(&entry.team_slug)
        .bind(outcome_str(entry.outcome))
        .bind(&entry.detail)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn health_check(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").fetch_one(&self.pool).await?;
        Ok(())
    }
}
