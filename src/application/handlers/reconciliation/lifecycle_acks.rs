//! Log-only lifecycle acknowledgements.
//!
//! Several recognized event types carry no ledger effect: abandoned
//! checkouts, trial-ending notices, voided and written-off invoices.
//! Registering them here means they are processed and audited as ignored
//! instead of warned about as unknown traffic.

use async_trait::async_trait;
use tracing::info;

use crate::application::router::{Outcome, ReconciliationHandler};
use crate::domain::billing::{EventPayload, ProviderEvent, ProviderEventType, WebhookError};

/// Acknowledges lifecycle events that this engine records but does not act on.
pub struct LifecycleAckHandler;

impl LifecycleAckHandler {
    pub fn new() -> Self {
        Self
    }
}

impl Default for LifecycleAckHandler {
    fn default() -> Self {
        Self::new()
    }
}

/// The provider object id inside the payload, for log correlation.
fn object_id(event: &ProviderEvent) -> &str {
    match &event.payload {
        EventPayload::CheckoutSession(session) => &session.id,
        EventPayload::Subscription(subscription) => &subscription.id,
        EventPayload::Invoice(invoice) => &invoice.id,
        EventPayload::Unrecognized(_) => "",
    }
}

#[async_trait]
impl ReconciliationHandler for LifecycleAckHandler {
    fn handles(&self) -> Vec<ProviderEventType> {
        vec![
            ProviderEventType::CheckoutSessionExpired,
            ProviderEventType::CustomerSubscriptionTrialWillEnd,
            ProviderEventType::InvoiceVoided,
            ProviderEventType::InvoiceMarkedUncollectible,
        ]
    }

    async fn handle(&self, event: &ProviderEvent) -> Result<Outcome, WebhookError> {
        info!(
            event_type = %event.event_type,
            object_id = object_id(event),
            "lifecycle event acknowledged, no ledger effect"
        );
        Ok(Outcome::ignored(format!(
            "{} acknowledged, log-only",
            event.event_type
        )))
    }

    fn name(&self) -> &'static str {
        "lifecycle_ack"
    }
}
