//! LedgerStore port - Interface for the billing ledger.
//!
//! The ledger holds the three aggregates reconciliation converges:
//! subscriptions, payments, and the per-user billing profile. Reads are
//! plain point lookups by external (provider) ids; every write happens
//! inside a [`LedgerTransaction`] guard so a handler that touches more
//! than one aggregate commits all of its writes or none of them.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::billing::{BillingProfile, Payment, PaymentFields, Subscription, SubscriptionChanges};
use crate::domain::foundation::{PaymentId, SubscriptionId, UserId};

/// Errors surfaced by ledger store implementations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LedgerError {
    /// Underlying storage failure (connection, query, serialization).
    #[error("database error: {0}")]
    Database(String),

    /// A write referenced a row that does not exist.
    #[error("{0} not found")]
    NotFound(&'static str),
}

/// Port for reading the billing ledger.
///
/// Lookups are keyed by provider-issued external ids because webhook events
/// only carry those; internal ids never leave this system.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Finds a subscription by the provider's subscription id (sub_xxx).
    async fn find_subscription_by_provider_id(
        &self,
        provider_subscription_id: &str,
    ) -> Result<Option<Subscription>, LedgerError>;

    /// Finds a payment by the provider's transaction id (payment intent id,
    /// or invoice id when no intent exists).
    async fn find_payment_by_provider_txn_id(
        &self,
        provider_transaction_id: &str,
    ) -> Result<Option<Payment>, LedgerError>;

    /// Finds a user's billing profile.
    async fn find_user(&self, user_id: UserId) -> Result<Option<BillingProfile>, LedgerError>;

    /// Opens a write transaction.
    ///
    /// The returned guard rolls back when dropped without [`LedgerTransaction::commit`],
    /// on success, failure, or task cancellation alike.
    async fn begin(&self) -> Result<Box<dyn LedgerTransaction>, LedgerError>;
}

/// A scoped write transaction against the ledger.
///
/// All mutations a reconciliation handler performs go through one guard.
/// Dropping the guard without calling `commit` discards every write made
/// through it; there is no partial state another task can observe.
#[async_trait]
pub trait LedgerTransaction: Send {
    /// Inserts a new subscription.
    ///
    /// Keyed on the provider subscription id: inserting an id the ledger
    /// already holds is a no-op, so racing deliveries of the same creation
    /// event converge on a single row. Returns the id of the row the
    /// provider id resolves to, whether freshly inserted or pre-existing,
    /// so callers link the surviving row and never a discarded one.
    async fn create_subscription(
        &mut self,
        subscription: Subscription,
    ) -> Result<SubscriptionId, LedgerError>;

    /// Applies a partial update to an existing subscription.
    ///
    /// Only fields set in `changes` are written.
    ///
    /// # Errors
    ///
    /// `NotFound` if no subscription has this id.
    async fn update_subscription(
        &mut self,
        id: SubscriptionId,
        changes: SubscriptionChanges,
    ) -> Result<(), LedgerError>;

    /// Inserts or updates a payment, keyed on the provider transaction id.
    ///
    /// An existing payment in `success` status is never modified; a payment
    /// in any other status is overwritten with the incoming fields. Returns
    /// the id of the row the transaction id resolves to either way.
    async fn upsert_payment(&mut self, fields: PaymentFields) -> Result<PaymentId, LedgerError>;

    /// Points the user's billing profile at this subscription.
    async fn set_active_subscription(
        &mut self,
        user_id: UserId,
        subscription_id: SubscriptionId,
    ) -> Result<(), LedgerError>;

    /// Clears the user's active subscription only if it currently points at
    /// `subscription_id`. A stale deletion event for a superseded
    /// subscription must not detach the user's current one.
    async fn clear_active_subscription_if(
        &mut self,
        user_id: UserId,
        subscription_id: SubscriptionId,
    ) -> Result<(), LedgerError>;

    /// Adds a payment to the user's payment set. Idempotent: adding a
    /// payment already in the set changes nothing.
    async fn add_payment_to_user(
        &mut self,
        user_id: UserId,
        payment_id: PaymentId,
    ) -> Result<(), LedgerError>;

    /// Commits every write made through this guard.
    async fn commit(self: Box<Self>) -> Result<(), LedgerError>;
}
