//! HTTP adapter for billing endpoints.
//!
//! Exposes the billing engine via REST API:
//! - `POST /billing/checkout` - Start a hosted checkout flow
//! - `POST /billing/portal` - Open the customer portal for a completed checkout
//! - `POST /webhooks/stripe` - Verify and reconcile provider webhooks
//! - `GET /health` - Liveness probe

pub mod dto;
pub mod handlers;
pub mod routes;

pub use handlers::{AuthenticatedUser, BillingApiError, BillingAppState};
pub use routes::billing_router;
