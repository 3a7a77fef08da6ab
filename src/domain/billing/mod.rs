//! Billing domain module.
//!
//! Models the ledger-side view of subscription billing: the aggregates
//! reconciliation converges (subscription, payment, billing profile), the
//! plan catalog entry, and the webhook boundary (event envelope, signature
//! verification, error taxonomy).
//!
//! # Module Structure
//!
//! - `subscription` - Subscription aggregate and status state machine
//! - `payment` - Payment record, method, and status
//! - `billing_profile` - Per-user billing view (active subscription, payments)
//! - `plan` - Catalog plan and tier
//! - `provider_event` - Typed webhook event envelope
//! - `webhook_verifier` - HMAC signature verification
//! - `errors` - Webhook processing error taxonomy

mod billing_profile;
mod errors;
mod payment;
mod plan;
mod provider_event;
mod subscription;
mod webhook_verifier;

pub use billing_profile::BillingProfile;
pub use errors::{SessionError, WebhookError};
pub use payment::{Payment, PaymentFields, PaymentMethod, PaymentStatus};
pub use plan::{Plan, PlanTier};
pub use provider_event::{
    CheckoutSessionObject, CorrelationMetadata, EventPayload, InvoiceObject, PriceObject,
    ProviderEvent, ProviderEventType, SubscriptionItem, SubscriptionItems, SubscriptionObject,
};
pub use subscription::{Subscription, SubscriptionChanges, SubscriptionStatus};
pub use webhook_verifier::{EventVerifier, SignatureHeader};

#[cfg(test)]
pub use provider_event::ProviderEventBuilder;
#[cfg(test)]
pub use webhook_verifier::compute_test_signature;
