//! Upcoming-renewal reconciliation.
//!
//! `invoice.upcoming` fires days before a renewal is attempted; the invoice
//! in the event does not exist yet (it carries no id). The only ledger effect
//! is refreshing the subscription's `next_billing_date` from the scheduled
//! attempt time. No payment record is written.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::application::router::{Outcome, ReconciliationHandler};
use crate::domain::billing::{
    ProviderEvent, ProviderEventType, SubscriptionChanges, WebhookError,
};
use crate::domain::foundation::Timestamp;
use crate::ports::LedgerStore;

/// Refreshes billing dates from upcoming-invoice notices.
pub struct InvoiceUpcomingHandler {
    ledger: Arc<dyn LedgerStore>,
}

impl InvoiceUpcomingHandler {
    pub fn new(ledger: Arc<dyn LedgerStore>) -> Self {
        Self { ledger }
    }
}

#[async_trait]
impl ReconciliationHandler for InvoiceUpcomingHandler {
    fn handles(&self) -> Vec<ProviderEventType> {
        vec![ProviderEventType::InvoiceUpcoming]
    }

    async fn handle(&self, event: &ProviderEvent) -> Result<Outcome, WebhookError> {
        let invoice = event.invoice()?;

        let provider_subscription_id = invoice
            .subscription
            .as_deref()
            .ok_or(WebhookError::SubscriptionNotFound)?;

        let subscription = self
            .ledger
            .find_subscription_by_provider_id(provider_subscription_id)
            .await?
            .ok_or(WebhookError::SubscriptionNotFound)?;

        let Some(next_attempt) = invoice.next_payment_attempt else {
            return Ok(Outcome::ignored("upcoming invoice has no scheduled attempt"));
        };
        let next_billing_date = Timestamp::from_unix_secs(next_attempt);
        if subscription.next_billing_date == next_billing_date {
            return Ok(Outcome::ignored("next billing date already current"));
        }

        let mut txn = self.ledger.begin().await?;
        txn.update_subscription(
            subscription.id,
            SubscriptionChanges {
                next_billing_date: Some(next_billing_date),
                ..Default::default()
            },
        )
        .await?;
        txn.commit().await?;

        debug!(
            subscription_id = %subscription.id,
            provider_subscription_id,
            next_attempt,
            "next billing date refreshed from upcoming invoice"
        );
        Ok(Outcome::Applied)
    }

    fn name(&self) -> &'static str {
        "invoice_upcoming"
    }
}
