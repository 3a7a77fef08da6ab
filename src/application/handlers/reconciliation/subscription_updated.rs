//! Subscription update reconciliation.
//!
//! Mirrors the provider's reported subscription state into the ledger via a
//! minimal diff, so duplicate deliveries write nothing. The one place local
//! state diverges from the report: `cancel_at_period_end = true` forces the
//! local status to `canceled` immediately, regardless of the reported status.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::application::router::{Outcome, ReconciliationHandler};
use crate::domain::billing::{
    ProviderEvent, ProviderEventType, SubscriptionStatus, WebhookError,
};
use crate::domain::foundation::{StateMachine, Timestamp};
use crate::ports::{LedgerStore, PlanCatalog};

/// Applies `customer.subscription.updated` reports to the ledger.
pub struct SubscriptionUpdatedHandler {
    ledger: Arc<dyn LedgerStore>,
    catalog: Arc<dyn PlanCatalog>,
}

impl SubscriptionUpdatedHandler {
    pub fn new(ledger: Arc<dyn LedgerStore>, catalog: Arc<dyn PlanCatalog>) -> Self {
        Self { ledger, catalog }
    }
}

#[async_trait]
impl ReconciliationHandler for SubscriptionUpdatedHandler {
    fn handles(&self) -> Vec<ProviderEventType> {
        vec![ProviderEventType::CustomerSubscriptionUpdated]
    }

    async fn handle(&self, event: &ProviderEvent) -> Result<Outcome, WebhookError> {
        let snapshot = event.subscription()?;

        let existing = self
            .ledger
            .find_subscription_by_provider_id(&snapshot.id)
            .await?
            .ok_or(WebhookError::SubscriptionNotFound)?;

        // Resolve the reported price against the catalog; a price this
        // engine has no plan for means the catalog has drifted and must be
        // surfaced, not silently kept.
        let plan_id = match snapshot.price_id() {
            Some(price_id) => {
                let plan = self
                    .catalog
                    .find_by_provider_price_id(price_id)
                    .await?
                    .ok_or_else(|| {
                        warn!(
                            price_id,
                            provider_subscription_id = %snapshot.id,
                            "no catalog plan for reported price id"
                        );
                        WebhookError::PlanNotFound
                    })?;
                plan.id
            }
            None => existing.plan_id,
        };

        let target_status = if snapshot.cancel_at_period_end {
            if snapshot.status != SubscriptionStatus::Canceled {
                info!(
                    provider_subscription_id = %snapshot.id,
                    reported_status = snapshot.status.as_str(),
                    "cancel_at_period_end set, overriding status to canceled"
                );
            }
            SubscriptionStatus::Canceled
        } else {
            snapshot.status
        };

        if existing.status != target_status
            && !existing.status.can_transition_to(&target_status)
        {
            warn!(
                provider_subscription_id = %snapshot.id,
                from = existing.status.as_str(),
                to = target_status.as_str(),
                "provider reported a transition outside the modeled lifecycle"
            );
        }

        let changes = existing.diff(
            target_status,
            plan_id,
            Timestamp::from_unix_secs(snapshot.current_period_end),
            snapshot.cancel_at_period_end,
        );
        if changes.is_empty() {
            return Ok(Outcome::ignored("subscription already up to date"));
        }

        let mut txn = self.ledger.begin().await?;
        txn.update_subscription(existing.id, changes).await?;
        txn.commit().await?;

        info!(
            subscription_id = %existing.id,
            provider_subscription_id = %snapshot.id,
            status = target_status.as_str(),
            "subscription updated from provider report"
        );
        Ok(Outcome::Applied)
    }

    fn name(&self) -> &'static str {
        "subscription_updated"
    }
}
