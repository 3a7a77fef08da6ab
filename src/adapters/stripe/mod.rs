//! Stripe adapter for the [`BillingProvider`](crate::ports::BillingProvider) port.
//!
//! The real adapter talks to Stripe's REST API with form-encoded bodies and
//! basic auth on the secret key. The mock is a configurable stand-in used by
//! handler and integration tests.
//!
//! Webhook signature verification is not part of this adapter; it lives with
//! the domain verifier so events are authenticated before any provider call.

mod mock_provider;
mod provider;

pub use mock_provider::{MethodCall, MockBillingProvider};
pub use provider::{StripeBillingProvider, StripeConfig};
