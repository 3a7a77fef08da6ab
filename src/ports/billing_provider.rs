//! BillingProvider port - Interface for the payment provider.
//!
//! Covers the outbound operations this engine needs: creating checkout and
//! billing-portal sessions, plus two point queries used during webhook
//! reconciliation. Webhook *verification* is not part of this port; events
//! are authenticated by the domain verifier before any provider call.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::billing::SubscriptionObject;
use crate::domain::foundation::{PlanId, UserId};

/// Errors surfaced by provider adapter implementations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderError {
    /// Transport-level failure: DNS, connect, timeout.
    #[error("network error: {0}")]
    Network(String),

    /// The provider answered with a non-success status.
    #[error("provider returned {status}: {message}")]
    Api { status: u16, message: String },

    /// The provider's response did not have the expected shape.
    #[error("unexpected provider response: {0}")]
    Malformed(String),
}

/// Request to create a hosted checkout session.
#[derive(Debug, Clone)]
pub struct CheckoutSessionRequest {
    /// Email to prefill on the checkout page.
    pub customer_email: String,

    /// Provider price id the session subscribes to.
    pub price_id: String,

    /// Correlation metadata echoed back on the events this session produces.
    pub user_id: UserId,
    pub plan_id: PlanId,

    /// Where the provider redirects after a completed checkout.
    pub success_url: String,

    /// Where the provider redirects after an abandoned checkout.
    pub cancel_url: String,
}

/// A checkout session, as created or retrieved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutSession {
    /// Session id (cs_xxx).
    pub id: String,

    /// Hosted page URL; present on freshly created sessions.
    pub url: Option<String>,

    /// Customer id, once the provider has assigned one.
    pub customer: Option<String>,

    /// Subscription id created by this session, once it completes.
    pub subscription: Option<String>,
}

/// A billing-portal session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortalSession {
    /// Session id (bps_xxx).
    pub id: String,

    /// Hosted portal URL to redirect the user to.
    pub url: String,
}

/// A payment intent, queried for failure diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentIntent {
    /// Intent id (pi_xxx).
    pub id: String,

    /// Provider-reported intent status.
    pub status: String,

    /// Human-readable reason for the last failed charge, if any.
    pub failure_message: Option<String>,
}

/// Port for talking to the payment provider.
#[async_trait]
pub trait BillingProvider: Send + Sync {
    /// Creates a hosted checkout session in subscription mode.
    async fn create_checkout_session(
        &self,
        request: CheckoutSessionRequest,
    ) -> Result<CheckoutSession, ProviderError>;

    /// Retrieves an existing checkout session by id.
    async fn retrieve_checkout_session(
        &self,
        session_id: &str,
    ) -> Result<CheckoutSession, ProviderError>;

    /// Creates a billing-portal session for a customer.
    async fn create_portal_session(
        &self,
        customer_id: &str,
        return_url: &str,
    ) -> Result<PortalSession, ProviderError>;

    /// Fetches the current state of a subscription.
    ///
    /// Used when a checkout-completed event references a subscription the
    /// event body does not fully describe.
    async fn get_subscription(
        &self,
        provider_subscription_id: &str,
    ) -> Result<SubscriptionObject, ProviderError>;

    /// Fetches a payment intent. Best-effort: callers treat failures here
    /// as missing diagnostics, never as processing failures.
    async fn get_payment_intent(
        &self,
        payment_intent_id: &str,
    ) -> Result<PaymentIntent, ProviderError>;
}
