//! Subscription creation reconciliation.
//!
//! Claims both wire tags that announce a new subscription:
//! `checkout.session.completed` and `customer.subscription.created`. The two
//! arrive in no guaranteed order; creation is keyed on the provider
//! subscription id, so whichever lands first creates the ledger row and the
//! other converges to a no-op.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::application::router::{Outcome, ReconciliationHandler};
use crate::domain::billing::{
    ProviderEvent, ProviderEventType, Subscription, SubscriptionObject, WebhookError,
};
use crate::domain::foundation::{PlanId, SubscriptionId, Timestamp, UserId};
use crate::ports::{BillingProvider, LedgerStore};

/// Creates the ledger Subscription for a newly subscribed user and links it
/// as the user's active subscription.
pub struct SubscriptionCreatedHandler {
    ledger: Arc<dyn LedgerStore>,
    provider: Arc<dyn BillingProvider>,
}

impl SubscriptionCreatedHandler {
    pub fn new(ledger: Arc<dyn LedgerStore>, provider: Arc<dyn BillingProvider>) -> Self {
        Self { ledger, provider }
    }

    /// `checkout.session.completed`: the session only names the subscription,
    /// so the full snapshot comes from the provider point query.
    async fn from_checkout_session(
        &self,
        event: &ProviderEvent,
    ) -> Result<Outcome, WebhookError> {
        let session = event.checkout_session()?;

        // Sessions in payment mode (one-off purchases) complete without a
        // subscription; they are not this engine's concern.
        let Some(provider_subscription_id) = session.subscription.as_deref() else {
            return Ok(Outcome::ignored("checkout session carries no subscription"));
        };

        let (user_id, plan_id) = session.metadata.require_ids()?;

        if let Some(existing) = self
            .ledger
            .find_subscription_by_provider_id(provider_subscription_id)
            .await?
        {
            info!(
                provider_subscription_id,
                subscription_id = %existing.id,
                "subscription already in ledger, skipping creation"
            );
            return Ok(Outcome::ignored("subscription already exists"));
        }

        self.ledger
            .find_user(user_id)
            .await?
            .ok_or(WebhookError::UserNotFound)?;

        let snapshot = self
            .provider
            .get_subscription(provider_subscription_id)
            .await?;

        self.create_and_link(user_id, plan_id, &snapshot).await
    }

    /// `customer.subscription.created`: the event body is the full snapshot.
    async fn from_subscription_object(
        &self,
        event: &ProviderEvent,
    ) -> Result<Outcome, WebhookError> {
        let snapshot = event.subscription()?;
        let (user_id, plan_id) = snapshot.metadata.require_ids()?;

        if let Some(existing) = self
            .ledger
            .find_subscription_by_provider_id(&snapshot.id)
            .await?
        {
            info!(
                provider_subscription_id = %snapshot.id,
                subscription_id = %existing.id,
                "subscription already in ledger, skipping creation"
            );
            return Ok(Outcome::ignored("subscription already exists"));
        }

        self.ledger
            .find_user(user_id)
            .await?
            .ok_or(WebhookError::UserNotFound)?;

        self.create_and_link(user_id, plan_id, snapshot).await
    }

    async fn create_and_link(
        &self,
        user_id: UserId,
        plan_id: PlanId,
        snapshot: &SubscriptionObject,
    ) -> Result<Outcome, WebhookError> {
        let subscription = subscription_from_snapshot(user_id, plan_id, snapshot);

        let mut txn = self.ledger.begin().await?;
        // The id the provider id resolved to, in case a racing delivery
        // inserted the row between our pre-check and this transaction.
        let subscription_id = txn.create_subscription(subscription).await?;
        txn.set_active_subscription(user_id, subscription_id).await?;
        txn.commit().await?;

        info!(
            user_id = %user_id,
            subscription_id = %subscription_id,
            provider_subscription_id = %snapshot.id,
            status = snapshot.status.as_str(),
            "subscription created and linked as active"
        );
        Ok(Outcome::Applied)
    }
}

/// Materializes a ledger Subscription from a provider snapshot.
fn subscription_from_snapshot(
    user_id: UserId,
    plan_id: PlanId,
    snapshot: &SubscriptionObject,
) -> Subscription {
    let mut subscription = Subscription::create(
        SubscriptionId::new(),
        user_id,
        plan_id,
        snapshot.status,
        Timestamp::from_unix_secs(snapshot.start_date),
        Timestamp::from_unix_secs(snapshot.current_period_end),
        snapshot.customer.clone(),
        snapshot.id.clone(),
    );
    subscription.cancel_at_period_end = snapshot.cancel_at_period_end;
    subscription
}

#[async_trait]
impl ReconciliationHandler for SubscriptionCreatedHandler {
    fn handles(&self) -> Vec<ProviderEventType> {
        vec![
            ProviderEventType::CheckoutSessionCompleted,
            ProviderEventType::CustomerSubscriptionCreated,
        ]
    }

    async fn handle(&self, event: &ProviderEvent) -> Result<Outcome, WebhookError> {
        match event.event_type {
            ProviderEventType::CheckoutSessionCompleted => {
                self.from_checkout_session(event).await
            }
            _ => self.from_subscription_object(event).await,
        }
    }

    fn name(&self) -> &'static str {
        "subscription_created"
    }
}
