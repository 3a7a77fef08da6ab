//! Failed renewal reconciliation.
//!
//! `invoice.payment_failed` marks the subscription `past_due` and records a
//! `failed` Payment. The human-readable decline reason lives on the payment
//! intent, not the invoice, so it is fetched best-effort: a lookup failure
//! costs the diagnostic, never the event.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::application::router::{Outcome, ReconciliationHandler};
use crate::domain::billing::{
    InvoiceObject, PaymentFields, PaymentMethod, PaymentStatus, ProviderEvent, ProviderEventType,
    SubscriptionChanges, SubscriptionStatus, WebhookError,
};
use crate::domain::foundation::{Money, StateMachine, Timestamp};
use crate::ports::{BillingProvider, LedgerStore};

/// Records failed renewal invoices against the ledger.
pub struct InvoicePaymentFailedHandler {
    ledger: Arc<dyn LedgerStore>,
    provider: Arc<dyn BillingProvider>,
}

impl InvoicePaymentFailedHandler {
    pub fn new(ledger: Arc<dyn LedgerStore>, provider: Arc<dyn BillingProvider>) -> Self {
        Self { ledger, provider }
    }

    /// Fetches the decline reason from the payment intent, degrading to
    /// `None` on any failure.
    async fn failure_reason(&self, invoice: &InvoiceObject) -> Option<String> {
        let intent_id = invoice.payment_intent.as_deref()?;
        match self.provider.get_payment_intent(intent_id).await {
            Ok(intent) => intent.failure_message,
            Err(error) => {
                warn!(
                    payment_intent_id = intent_id,
                    error = %error,
                    "decline-reason lookup failed, recording payment without it"
                );
                None
            }
        }
    }
}

#[async_trait]
impl ReconciliationHandler for InvoicePaymentFailedHandler {
    fn handles(&self) -> Vec<ProviderEventType> {
        vec![ProviderEventType::InvoicePaymentFailed]
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

        let failure_reason = self.failure_reason(invoice).await;

        let fields = PaymentFields {
            user_id: subscription.user_id,
            subscription_id: Some(subscription.id),
            amount: Money::from_minor_units(
                invoice.amount_due.unwrap_or(0),
                invoice.currency.as_deref().unwrap_or_default(),
            ),
            method: PaymentMethod::Card,
            status: PaymentStatus::Failed,
            provider_transaction_id: invoice.transaction_id().to_string(),
            paid_at: invoice
                .created
                .map(Timestamp::from_unix_secs)
                .unwrap_or_else(Timestamp::now),
            failure_reason: failure_reason.clone(),
        };

        let mut changes = SubscriptionChanges::default();
        if subscription.status != SubscriptionStatus::PastDue {
            if !subscription
                .status
                .can_transition_to(&SubscriptionStatus::PastDue)
            {
                warn!(
                    provider_subscription_id,
                    from = subscription.status.as_str(),
                    "failed invoice dunning a subscription outside the modeled lifecycle"
                );
            }
            changes.status = Some(SubscriptionStatus::PastDue);
        }

        let mut txn = self.ledger.begin().await?;
        let payment_id = txn.upsert_payment(fields).await?;
        txn.add_payment_to_user(subscription.user_id, payment_id)
            .await?;
        if !changes.is_empty() {
            txn.update_subscription(subscription.id, changes).await?;
        }
        txn.commit().await?;

        info!(
            payment_id = %payment_id,
            subscription_id = %subscription.id,
            attempt_count = invoice.attempt_count.unwrap_or(0),
            failure_reason = failure_reason.as_deref().unwrap_or("unknown"),
            "failed renewal recorded, subscription past due"
        );
        Ok(Outcome::Applied)
    }

    fn name(&self) -> &'static str {
        "invoice_payment_failed"
    }
}
