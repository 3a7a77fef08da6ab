//! Reconciliation handlers - per-event-type ledger convergence.
//!
//! Each handler owns one slice of the provider's event vocabulary and applies
//! it to the ledger idempotently. Deliveries are at-least-once and unordered;
//! every handler converges on external-id upserts and minimal diffs rather
//! than assuming it runs first, once, or last.

mod invoice_paid;
mod invoice_payment_failed;
mod invoice_upcoming;
mod lifecycle_acks;
mod subscription_created;
mod subscription_deleted;
mod subscription_updated;

pub use invoice_paid::InvoicePaidHandler;
pub use invoice_payment_failed::InvoicePaymentFailedHandler;
pub use invoice_upcoming::InvoiceUpcomingHandler;
pub use lifecycle_acks::LifecycleAckHandler;
pub use subscription_created::SubscriptionCreatedHandler;
pub use subscription_deleted::SubscriptionDeletedHandler;
pub use subscription_updated::SubscriptionUpdatedHandler;

use std::sync::Arc;

use crate::application::router::ReconciliationHandler;
use crate::ports::{BillingProvider, LedgerStore, PlanCatalog};

/// Builds the full handler set for the event router.
pub fn reconciliation_handlers(
    ledger: Arc<dyn LedgerStore>,
    catalog: Arc<dyn PlanCatalog>,
    provider: Arc<dyn BillingProvider>,
) -> Vec<Arc<dyn ReconciliationHandler>> {
    vec![
        Arc::new(SubscriptionCreatedHandler::new(
            Arc::clone(&ledger),
            Arc::clone(&provider),
        )),
        Arc::new(SubscriptionUpdatedHandler::new(Arc::clone(&ledger), catalog)),
        Arc::new(SubscriptionDeletedHandler::new(Arc::clone(&ledger))),
        Arc::new(InvoicePaidHandler::new(Arc::clone(&ledger))),
        Arc::new(InvoicePaymentFailedHandler::new(
            Arc::clone(&ledger),
            provider,
        )),
        Arc::new(InvoiceUpcomingHandler::new(ledger)),
        Arc::new(LifecycleAckHandler::new()),
    ]
}
