//! PostgreSQL implementation of the ledger store.
//!
//! Reads run against the pool; every write path goes through a
//! [`sqlx::Transaction`] held by the guard, so dropping the guard without
//! commit rolls back all of its writes. Idempotency lives in the SQL:
//! inserts are keyed on provider-issued external ids with `ON CONFLICT`
//! clauses instead of read-then-write checks.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres};
use uuid::Uuid;

use crate::domain::billing::{
    BillingProfile, Payment, PaymentFields, PaymentMethod, PaymentStatus, Subscription,
    SubscriptionChanges, SubscriptionStatus,
};
use crate::domain::foundation::{Money, PaymentId, PlanId, SubscriptionId, Timestamp, UserId};
use crate::ports::{LedgerError, LedgerStore, LedgerTransaction};

/// PostgreSQL implementation of the [`LedgerStore`] port.
pub struct PostgresLedgerStore {
    pool: PgPool,
}

impl PostgresLedgerStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Row Mapping
// ════════════════════════════════════════════════════════════════════════════

#[derive(Debug, sqlx::FromRow)]
struct SubscriptionRow {
    id: Uuid,
    user_id: Uuid,
    plan_id: Uuid,
    status: String,
    start_date: DateTime<Utc>,
    next_billing_date: DateTime<Utc>,
    last_payment_date: Option<DateTime<Utc>>,
    cancel_at_period_end: bool,
    provider_customer_id: String,
    provider_subscription_id: String,
    canceled_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<SubscriptionRow> for Subscription {
    type Error = LedgerError;

    fn try_from(row: SubscriptionRow) -> Result<Self, Self::Error> {
        let status = SubscriptionStatus::from_provider(&row.status).ok_or_else(|| {
            LedgerError::Database(format!("invalid subscription status: {}", row.status))
        })?;

        Ok(Subscription {
            id: SubscriptionId::from_uuid(row.id),
            user_id: UserId::from_uuid(row.user_id),
            plan_id: PlanId::from_uuid(row.plan_id),
            status,
            start_date: Timestamp::from_datetime(row.start_date),
            next_billing_date: Timestamp::from_datetime(row.next_billing_date),
            last_payment_date: row.last_payment_date.map(Timestamp::from_datetime),
            cancel_at_period_end: row.cancel_at_period_end,
            provider_customer_id: row.provider_customer_id,
            provider_subscription_id: row.provider_subscription_id,
            canceled_at: row.canceled_at.map(Timestamp::from_datetime),
            created_at: Timestamp::from_datetime(row.created_at),
            updated_at: Timestamp::from_datetime(row.updated_at),
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PaymentRow {
    id: Uuid,
    user_id: Uuid,
    subscription_id: Option<Uuid>,
    amount: Decimal,
    currency: String,
    method: String,
    status: String,
    provider_transaction_id: String,
    paid_at: DateTime<Utc>,
    failure_reason: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<PaymentRow> for Payment {
    type Error = LedgerError;

    fn try_from(row: PaymentRow) -> Result<Self, Self::Error> {
        let method = PaymentMethod::from_stored(&row.method)
            .ok_or_else(|| LedgerError::Database(format!("invalid payment method: {}", row.method)))?;
        let status = PaymentStatus::from_stored(&row.status)
            .ok_or_else(|| LedgerError::Database(format!("invalid payment status: {}", row.status)))?;

        Ok(Payment {
            id: PaymentId::from_uuid(row.id),
            user_id: UserId::from_uuid(row.user_id),
            subscription_id: row.subscription_id.map(SubscriptionId::from_uuid),
            amount: Money::new(row.amount, &row.currency),
            method,
            status,
            provider_transaction_id: row.provider_transaction_id,
            paid_at: Timestamp::from_datetime(row.paid_at),
            failure_reason: row.failure_reason,
            created_at: Timestamp::from_datetime(row.created_at),
            updated_at: Timestamp::from_datetime(row.updated_at),
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct UserBillingRow {
    active_subscription_id: Option<Uuid>,
    updated_at: DateTime<Utc>,
}

fn db_error(e: sqlx::Error) -> LedgerError {
    LedgerError::Database(e.to_string())
}

/// Maps write failures, turning user foreign-key violations into `NotFound`.
///
/// Provider metadata can reference a user this system has never seen; that
/// is a data problem on the event, not a storage failure.
fn write_error(e: sqlx::Error) -> LedgerError {
    if let sqlx::Error::Database(db_err) = &e {
        if let Some(constraint) = db_err.constraint() {
            if constraint.ends_with("user_id_fkey") {
                return LedgerError::NotFound("user");
            }
        }
    }
    LedgerError::Database(e.to_string())
}

// ════════════════════════════════════════════════════════════════════════════
// Reads
// ════════════════════════════════════════════════════════════════════════════

const SUBSCRIPTION_COLUMNS: &str = "id, user_id, plan_id, status, start_date, next_billing_date, \
     last_payment_date, cancel_at_period_end, provider_customer_id, \
     provider_subscription_id, canceled_at, created_at, updated_at";

const PAYMENT_COLUMNS: &str = "id, user_id, subscription_id, amount, currency, method, status, \
     provider_transaction_id, paid_at, failure_reason, created_at, updated_at";

#[async_trait]
impl LedgerStore for PostgresLedgerStore {
    async fn find_subscription_by_provider_id(
        &self,
        provider_subscription_id: &str,
    ) -> Result<Option<Subscription>, LedgerError> {
        let row: Option<SubscriptionRow> = sqlx::query_as(&format!(
            "SELECT {} FROM subscriptions WHERE provider_subscription_id = $1",
            SUBSCRIPTION_COLUMNS
        ))
        .bind(provider_subscription_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;

        row.map(Subscription::try_from).transpose()
    }

    async fn find_payment_by_provider_txn_id(
        &self,
        provider_transaction_id: &str,
    ) -> Result<Option<Payment>, LedgerError> {
        let row: Option<PaymentRow> = sqlx::query_as(&format!(
            "SELECT {} FROM payments WHERE provider_transaction_id = $1",
            PAYMENT_COLUMNS
        ))
        .bind(provider_transaction_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;

        row.map(Payment::try_from).transpose()
    }

    async fn find_user(&self, user_id: UserId) -> Result<Option<BillingProfile>, LedgerError> {
        let row: Option<UserBillingRow> = sqlx::query_as(
            "SELECT active_subscription_id, updated_at FROM users WHERE id = $1",
        )
        .bind(user_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;

        let Some(row) = row else {
            return Ok(None);
        };

        let payment_ids: Vec<(Uuid,)> = sqlx::query_as(
            "SELECT payment_id FROM user_payments WHERE user_id = $1 ORDER BY added_at, payment_id",
        )
        .bind(user_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(Some(BillingProfile {
            user_id,
            active_subscription_id: row.active_subscription_id.map(SubscriptionId::from_uuid),
            payment_ids: payment_ids
                .into_iter()
                .map(|(id,)| PaymentId::from_uuid(id))
                .collect(),
            updated_at: Timestamp::from_datetime(row.updated_at),
        }))
    }

    async fn begin(&self) -> Result<Box<dyn LedgerTransaction>, LedgerError> {
        let txn = self.pool.begin().await.map_err(db_error)?;
        Ok(Box::new(PostgresLedgerTransaction { txn }))
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Transaction Guard
// ════════════════════════════════════════════════════════════════════════════

/// Write guard over a database transaction.
///
/// Dropping without [`LedgerTransaction::commit`] lets sqlx roll the
/// transaction back when the connection returns to the pool.
struct PostgresLedgerTransaction {
    txn: sqlx::Transaction<'static, Postgres>,
}

#[async_trait]
impl LedgerTransaction for PostgresLedgerTransaction {
    async fn create_subscription(
        &mut self,
        subscription: Subscription,
    ) -> Result<SubscriptionId, LedgerError> {
        let inserted: Option<(Uuid,)> = sqlx::query_as(
            r#"
            INSERT INTO subscriptions (
                id, user_id, plan_id, status, start_date, next_billing_date,
                last_payment_date, cancel_at_period_end, provider_customer_id,
                provider_subscription_id, canceled_at, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            ON CONFLICT (provider_subscription_id) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(subscription.id.as_uuid())
        .bind(subscription.user_id.as_uuid())
        .bind(subscription.plan_id.as_uuid())
        .bind(subscription.status.as_str())
        .bind(subscription.start_date.as_datetime())
        .bind(subscription.next_billing_date.as_datetime())
        .bind(subscription.last_payment_date.map(|t| *t.as_datetime()))
        .bind(subscription.cancel_at_period_end)
        .bind(&subscription.provider_customer_id)
        .bind(&subscription.provider_subscription_id)
        .bind(subscription.canceled_at.map(|t| *t.as_datetime()))
        .bind(subscription.created_at.as_datetime())
        .bind(subscription.updated_at.as_datetime())
        .fetch_optional(&mut *self.txn)
        .await
        .map_err(write_error)?;

        if let Some((id,)) = inserted {
            return Ok(SubscriptionId::from_uuid(id));
        }

        // A concurrent delivery inserted this provider id first; resolve to
        // the row that won.
        let (id,): (Uuid,) =
            sqlx::query_as("SELECT id FROM subscriptions WHERE provider_subscription_id = $1")
                .bind(&subscription.provider_subscription_id)
                .fetch_one(&mut *self.txn)
                .await
                .map_err(db_error)?;

        Ok(SubscriptionId::from_uuid(id))
    }

    async fn update_subscription(
        &mut self,
        id: SubscriptionId,
        changes: SubscriptionChanges,
    ) -> Result<(), LedgerError> {
        let result = sqlx::query(
            r#"
            UPDATE subscriptions SET
                status = COALESCE($2, status),
                plan_id = COALESCE($3, plan_id),
                next_billing_date = COALESCE($4, next_billing_date),
                last_payment_date = COALESCE($5, last_payment_date),
                cancel_at_period_end = COALESCE($6, cancel_at_period_end),
                canceled_at = COALESCE($7, canceled_at),
                updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .bind(changes.status.map(|s| s.as_str()))
        .bind(changes.plan_id.map(|p| *p.as_uuid()))
        .bind(changes.next_billing_date.map(|t| *t.as_datetime()))
        .bind(changes.last_payment_date.map(|t| *t.as_datetime()))
        .bind(changes.cancel_at_period_end)
        .bind(changes.canceled_at.map(|t| *t.as_datetime()))
        .execute(&mut *self.txn)
        .await
        .map_err(db_error)?;

        if result.rows_affected() == 0 {
            return Err(LedgerError::NotFound("subscription"));
        }

        Ok(())
    }

    async fn upsert_payment(&mut self, fields: PaymentFields) -> Result<PaymentId, LedgerError> {
        let payment = fields.into_payment(PaymentId::new());

        let written: Option<(Uuid,)> = sqlx::query_as(
            r#"
            INSERT INTO payments (
                id, user_id, subscription_id, amount, currency, method, status,
                provider_transaction_id, paid_at, failure_reason, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ON CONFLICT (provider_transaction_id) DO UPDATE SET
                user_id = EXCLUDED.user_id,
                subscription_id = EXCLUDED.subscription_id,
                amount = EXCLUDED.amount,
                currency = EXCLUDED.currency,
                method = EXCLUDED.method,
                status = EXCLUDED.status,
                paid_at = EXCLUDED.paid_at,
                failure_reason = EXCLUDED.failure_reason,
                updated_at = now()
            WHERE payments.status != 'success'
            RETURNING id
            "#,
        )
        .bind(payment.id.as_uuid())
        .bind(payment.user_id.as_uuid())
        .bind(payment.subscription_id.map(|s| *s.as_uuid()))
        .bind(payment.amount.amount())
        .bind(payment.amount.currency())
        .bind(payment.method.as_str())
        .bind(payment.status.as_str())
        .bind(&payment.provider_transaction_id)
        .bind(payment.paid_at.as_datetime())
        .bind(payment.failure_reason.as_deref())
        .bind(payment.created_at.as_datetime())
        .bind(payment.updated_at.as_datetime())
        .fetch_optional(&mut *self.txn)
        .await
        .map_err(write_error)?;

        if let Some((id,)) = written {
            return Ok(PaymentId::from_uuid(id));
        }

        // The conflict action's WHERE skipped the write: a settled success
        // row holds this transaction id and stays as-is.
        let (id,): (Uuid,) =
            sqlx::query_as("SELECT id FROM payments WHERE provider_transaction_id = $1")
                .bind(&payment.provider_transaction_id)
                .fetch_one(&mut *self.txn)
                .await
                .map_err(db_error)?;

        Ok(PaymentId::from_uuid(id))
    }

    async fn set_active_subscription(
        &mut self,
        user_id: UserId,
        subscription_id: SubscriptionId,
    ) -> Result<(), LedgerError> {
        let result = sqlx::query(
            "UPDATE users SET active_subscription_id = $2, updated_at = now() WHERE id = $1",
        )
        .bind(user_id.as_uuid())
        .bind(subscription_id.as_uuid())
        .execute(&mut *self.txn)
        .await
        .map_err(db_error)?;

        if result.rows_affected() == 0 {
            return Err(LedgerError::NotFound("user"));
        }

        Ok(())
    }

    async fn clear_active_subscription_if(
        &mut self,
        user_id: UserId,
        subscription_id: SubscriptionId,
    ) -> Result<(), LedgerError> {
        // Zero rows affected means the pointer moved on to a newer
        // subscription; that is the intended no-op, not an error.
        sqlx::query(
            r#"
            UPDATE users SET active_subscription_id = NULL, updated_at = now()
            WHERE id = $1 AND active_subscription_id = $2
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(subscription_id.as_uuid())
        .execute(&mut *self.txn)
        .await
        .map_err(db_error)?;

        Ok(())
    }

    async fn add_payment_to_user(
        &mut self,
        user_id: UserId,
        payment_id: PaymentId,
    ) -> Result<(), LedgerError> {
        sqlx::query(
            r#"
            INSERT INTO user_payments (user_id, payment_id)
            VALUES ($1, $2)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(payment_id.as_uuid())
        .execute(&mut *self.txn)
        .await
        .map_err(write_error)?;

        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), LedgerError> {
        self.txn.commit().await.map_err(db_error)
    }
}
