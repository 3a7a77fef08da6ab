//! Subscription deletion reconciliation.
//!
//! `customer.subscription.deleted` is the provider's terminal signal. The
//! ledger record is never removed; it transitions into `canceled` and the
//! owning user's active-subscription back-reference is cleared, conditionally,
//! in the same transaction.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::application::router::{Outcome, ReconciliationHandler};
use crate::domain::billing::{
    ProviderEvent, ProviderEventType, SubscriptionStatus, WebhookError,
};
use crate::ports::LedgerStore;

/// Terminates the ledger Subscription for a deleted provider subscription.
pub struct SubscriptionDeletedHandler {
    ledger: Arc<dyn LedgerStore>,
}

impl SubscriptionDeletedHandler {
    pub fn new(ledger: Arc<dyn LedgerStore>) -> Self {
        Self { ledger }
    }
}

#[async_trait]
impl ReconciliationHandler for SubscriptionDeletedHandler {
    fn handles(&self) -> Vec<ProviderEventType> {
        vec![ProviderEventType::CustomerSubscriptionDeleted]
    }

    async fn handle(&self, event: &ProviderEvent) -> Result<Outcome, WebhookError> {
        let snapshot = event.subscription()?;

        let existing = self
            .ledger
            .find_subscription_by_provider_id(&snapshot.id)
            .await?
            .ok_or(WebhookError::SubscriptionNotFound)?;

        if existing.is_canceled() {
            return Ok(Outcome::ignored("subscription already canceled"));
        }

        let changes = existing.diff(
            SubscriptionStatus::Canceled,
            existing.plan_id,
            existing.next_billing_date,
            existing.cancel_at_period_end,
        );

        // Cancel and unlink atomically: a user observed mid-way must never
        // see a canceled subscription still linked as active, nor the
        // reverse.
        let mut txn = self.ledger.begin().await?;
        txn.update_subscription(existing.id, changes).await?;
        txn.clear_active_subscription_if(existing.user_id, existing.id)
            .await?;
        txn.commit().await?;

        info!(
            subscription_id = %existing.id,
            provider_subscription_id = %snapshot.id,
            user_id = %existing.user_id,
            "subscription canceled and unlinked"
        );
        Ok(Outcome::Applied)
    }

    fn name(&self) -> &'static str {
        "subscription_deleted"
    }
}
