//! In-memory ledger store.
//!
//! Backs the full [`LedgerStore`] contract with plain maps behind a
//! `tokio::sync::Mutex`. Transactions take the lock for their whole scope
//! and keep a snapshot of the state; dropping the guard without commit
//! restores the snapshot, so rollback semantics match the Postgres adapter.
//!
//! Used by unit and integration tests and for running the service locally
//! without a database. Errors can be injected per method to exercise
//! rollback paths.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};

use async_trait::async_trait;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::domain::billing::{
    BillingProfile, Payment, PaymentFields, PaymentStatus, Subscription, SubscriptionChanges,
};
use crate::domain::foundation::{PaymentId, SubscriptionId, UserId};
use crate::ports::{LedgerError, LedgerStore, LedgerTransaction};

/// Everything the ledger holds, cloneable for snapshot-restore.
#[derive(Debug, Clone, Default)]
struct LedgerState {
    subscriptions: HashMap<SubscriptionId, Subscription>,
    payments: HashMap<PaymentId, Payment>,
    profiles: HashMap<UserId, BillingProfile>,
}

/// In-memory implementation of [`LedgerStore`].
#[derive(Clone)]
pub struct InMemoryLedgerStore {
    state: Arc<Mutex<LedgerState>>,
    method_errors: Arc<StdMutex<HashMap<String, LedgerError>>>,
}

impl InMemoryLedgerStore {
    /// Creates an empty ledger.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(LedgerState::default())),
            method_errors: Arc::new(StdMutex::new(HashMap::new())),
        }
    }

    // === Seeding Helpers ===

    /// Inserts a billing profile directly, bypassing transactions.
    pub async fn insert_user(&self, profile: BillingProfile) {
        let mut state = self.state.lock().await;
        state.profiles.insert(profile.user_id, profile);
    }

    /// Inserts a subscription directly, bypassing transactions.
    pub async fn insert_subscription(&self, subscription: Subscription) {
        let mut state = self.state.lock().await;
        state.subscriptions.insert(subscription.id, subscription);
    }

    /// Inserts a payment directly, bypassing transactions.
    pub async fn insert_payment(&self, payment: Payment) {
        let mut state = self.state.lock().await;
        state.payments.insert(payment.id, payment);
    }

    // === Assertion Helpers ===

    /// Returns a subscription by internal id.
    pub async fn get_subscription(&self, id: SubscriptionId) -> Option<Subscription> {
        self.state.lock().await.subscriptions.get(&id).cloned()
    }

    /// Returns a billing profile by user id.
    pub async fn get_profile(&self, user_id: UserId) -> Option<BillingProfile> {
        self.state.lock().await.profiles.get(&user_id).cloned()
    }

    /// Number of subscriptions in the ledger.
    pub async fn subscription_count(&self) -> usize {
        self.state.lock().await.subscriptions.len()
    }

    /// Number of payments in the ledger.
    pub async fn payment_count(&self) -> usize {
        self.state.lock().await.payments.len()
    }

    /// All payments recorded for a user, in insertion order of the profile's
    /// payment set.
    pub async fn payments_for_user(&self, user_id: UserId) -> Vec<Payment> {
        let state = self.state.lock().await;
        let Some(profile) = state.profiles.get(&user_id) else {
            return Vec::new();
        };
        profile
            .payment_ids
            .iter()
            .filter_map(|id| state.payments.get(id).cloned())
            .collect()
    }

    // === Error Injection ===

    /// Makes the named transaction method fail until cleared. Lets tests
    /// break a transaction between writes and observe the rollback.
    pub fn set_error_for(&self, method: &str, error: LedgerError) {
        self.method_errors
            .lock()
            .expect("method_errors lock poisoned")
            .insert(method.to_string(), error);
    }

    /// Clears all injected errors.
    pub fn clear_errors(&self) {
        self.method_errors
            .lock()
            .expect("method_errors lock poisoned")
            .clear();
    }

    fn check_error(
        method_errors: &StdMutex<HashMap<String, LedgerError>>,
        method: &str,
    ) -> Result<(), LedgerError> {
        let errors = method_errors.lock().expect("method_errors lock poisoned");
        match errors.get(method) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}

impl Default for InMemoryLedgerStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn find_subscription_by_provider_id(
        &self,
        provider_subscription_id: &str,
    ) -> Result<Option<Subscription>, LedgerError> {
        let state = self.state.lock().await;
        Ok(state
            .subscriptions
            .values()
            .find(|s| s.provider_subscription_id == provider_subscription_id)
            .cloned())
    }

    async fn find_payment_by_provider_txn_id(
        &self,
        provider_transaction_id: &str,
    ) -> Result<Option<Payment>, LedgerError> {
        let state = self.state.lock().await;
        Ok(state
            .payments
            .values()
            .find(|p| p.provider_transaction_id == provider_transaction_id)
            .cloned())
    }

    async fn find_user(&self, user_id: UserId) -> Result<Option<BillingProfile>, LedgerError> {
        let state = self.state.lock().await;
        Ok(state.profiles.get(&user_id).cloned())
    }

    async fn begin(&self) -> Result<Box<dyn LedgerTransaction>, LedgerError> {
        let guard = Arc::clone(&self.state).lock_owned().await;
        let snapshot = guard.clone();
        Ok(Box::new(InMemoryLedgerTransaction {
            guard,
            snapshot: Some(snapshot),
            method_errors: Arc::clone(&self.method_errors),
        }))
    }
}

/// Write transaction over the in-memory ledger.
///
/// Holds the state lock for its whole lifetime. On drop without commit the
/// pre-transaction snapshot is restored.
pub struct InMemoryLedgerTransaction {
    guard: OwnedMutexGuard<LedgerState>,
    /// Pre-transaction state; `None` once committed.
    snapshot: Option<LedgerState>,
    method_errors: Arc<StdMutex<HashMap<String, LedgerError>>>,
}

impl Drop for InMemoryLedgerTransaction {
    fn drop(&mut self) {
        if let Some(snapshot) = self.snapshot.take() {
            *self.guard = snapshot;
        }
    }
}

#[async_trait]
impl LedgerTransaction for InMemoryLedgerTransaction {
    async fn create_subscription(
        &mut self,
        subscription: Subscription,
    ) -> Result<SubscriptionId, LedgerError> {
        InMemoryLedgerStore::check_error(&self.method_errors, "create_subscription")?;
        if let Some(existing) = self
            .guard
            .subscriptions
            .values()
            .find(|s| s.provider_subscription_id == subscription.provider_subscription_id)
        {
            return Ok(existing.id);
        }
        let id = subscription.id;
        self.guard.subscriptions.insert(id, subscription);
        Ok(id)
    }

    async fn update_subscription(
        &mut self,
        id: SubscriptionId,
        changes: SubscriptionChanges,
    ) -> Result<(), LedgerError> {
        InMemoryLedgerStore::check_error(&self.method_errors, "update_subscription")?;
        let subscription = self
            .guard
            .subscriptions
            .get_mut(&id)
            .ok_or(LedgerError::NotFound("subscription"))?;
        subscription.apply_changes(&changes);
        Ok(())
    }

    async fn upsert_payment(&mut self, fields: PaymentFields) -> Result<PaymentId, LedgerError> {
        InMemoryLedgerStore::check_error(&self.method_errors, "upsert_payment")?;
        let existing = self
            .guard
            .payments
            .values()
            .find(|p| p.provider_transaction_id == fields.provider_transaction_id)
            .cloned();

        match existing {
            Some(payment) if payment.status == PaymentStatus::Success => Ok(payment.id),
            Some(payment) => {
                let mut updated = fields.into_payment(payment.id);
                updated.created_at = payment.created_at;
                self.guard.payments.insert(payment.id, updated);
                Ok(payment.id)
            }
            None => {
                let id = PaymentId::new();
                self.guard.payments.insert(id, fields.into_payment(id));
                Ok(id)
            }
        }
    }

    async fn set_active_subscription(
        &mut self,
        user_id: UserId,
        subscription_id: SubscriptionId,
    ) -> Result<(), LedgerError> {
        InMemoryLedgerStore::check_error(&self.method_errors, "set_active_subscription")?;
        let profile = self
            .guard
            .profiles
            .get_mut(&user_id)
            .ok_or(LedgerError::NotFound("user"))?;
        profile.link_active_subscription(subscription_id);
        Ok(())
    }

    async fn clear_active_subscription_if(
        &mut self,
        user_id: UserId,
        subscription_id: SubscriptionId,
    ) -> Result<(), LedgerError> {
        InMemoryLedgerStore::check_error(&self.method_errors, "clear_active_subscription_if")?;
        if let Some(profile) = self.guard.profiles.get_mut(&user_id) {
            profile.clear_active_subscription_if(subscription_id);
        }
        Ok(())
    }

    async fn add_payment_to_user(
        &mut self,
        user_id: UserId,
        payment_id: PaymentId,
    ) -> Result<(), LedgerError> {
        InMemoryLedgerStore::check_error(&self.method_errors, "add_payment_to_user")?;
        let profile = self
            .guard
            .profiles
            .get_mut(&user_id)
            .ok_or(LedgerError::NotFound("user"))?;
        profile.add_payment(payment_id);
        Ok(())
    }

    async fn commit(mut self: Box<Self>) -> Result<(), LedgerError> {
        // Dropping without a snapshot keeps the written state.
        self.snapshot = None;
        Ok(())
    }
}
