//! Renewal payment reconciliation.
//!
//! `invoice.paid` is the at-least-once signal that a renewal charge landed.
//! The Payment upsert keys on the provider transaction id, so redelivery
//! converges on one `success` record; the owning subscription is brought to
//! `active` with its billing dates advanced, all in one transaction.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::application::router::{Outcome, ReconciliationHandler};
use crate::domain::billing::{
    PaymentFields, PaymentMethod, PaymentStatus, ProviderEvent, ProviderEventType,
    SubscriptionChanges, SubscriptionStatus, WebhookError,
};
use crate::domain::foundation::{Money, StateMachine, Timestamp};
use crate::ports::LedgerStore;

/// Records collected renewal invoices against the ledger.
pub struct InvoicePaidHandler {
    ledger: Arc<dyn LedgerStore>,
}

impl InvoicePaidHandler {
    pub fn new(ledger: Arc<dyn LedgerStore>) -> Self {
        Self { ledger }
    }
}

#[async_trait]
impl ReconciliationHandler for InvoicePaidHandler {
    fn handles(&self) -> Vec<ProviderEventType> {
        vec![ProviderEventType::InvoicePaid]
    }

    async fn handle(&self, event: &ProviderEvent) -> Result<Outcome, WebhookError> {
        let invoice = event.invoice()?;

        // One-off invoices carry no subscription; there is nothing in this
        // ledger for them to renew.
        let provider_subscription_id = invoice
            .subscription
            .as_deref()
            .ok_or(WebhookError::SubscriptionNotFound)?;

        let subscription = self
            .ledger
            .find_subscription_by_provider_id(provider_subscription_id)
            .await?
            .ok_or(WebhookError::SubscriptionNotFound)?;

        let amount = Money::from_minor_units(
            invoice.amount_paid.unwrap_or(0),
            invoice.currency.as_deref().unwrap_or_default(),
        );
        let paid_at = invoice
            .created
            .map(Timestamp::from_unix_secs)
            .unwrap_or_else(Timestamp::now);
        let fields = PaymentFields {
            user_id: subscription.user_id,
            subscription_id: Some(subscription.id),
            amount: amount.clone(),
            method: PaymentMethod::Card,
            status: PaymentStatus::Success,
            provider_transaction_id: invoice.transaction_id().to_string(),
            paid_at,
            failure_reason: None,
        };

        let mut changes = SubscriptionChanges {
            last_payment_date: Some(Timestamp::now()),
            ..Default::default()
        };
        if subscription.status != SubscriptionStatus::Active {
            if !subscription
                .status
                .can_transition_to(&SubscriptionStatus::Active)
            {
                warn!(
                    provider_subscription_id,
                    from = subscription.status.as_str(),
                    "paid invoice reactivates a subscription outside the modeled lifecycle"
                );
            }
            changes.status = Some(SubscriptionStatus::Active);
        }
        if let Some(period_end) = invoice.period_end.map(Timestamp::from_unix_secs) {
            if subscription.next_billing_date != period_end {
                changes.next_billing_date = Some(period_end);
            }
        }

        let mut txn = self.ledger.begin().await?;
        let payment_id = txn.upsert_payment(fields).await?;
        txn.add_payment_to_user(subscription.user_id, payment_id)
            .await?;
        txn.update_subscription(subscription.id, changes).await?;
        txn.commit().await?;

        info!(
            payment_id = %payment_id,
            subscription_id = %subscription.id,
            user_id = %subscription.user_id,
            amount = %amount,
            "renewal payment recorded"
        );
        Ok(Outcome::Applied)
    }

    fn name(&self) -> &'static str {
        "invoice_paid"
    }
}
