//! Billing session handlers.
//!
//! User-initiated commands on the provider side of the boundary:
//!
//! - Starting a hosted checkout for a catalog plan
//! - Opening the billing portal for a completed checkout

mod create_checkout_session;
mod create_portal_session;

pub use create_checkout_session::{
    CreateCheckoutSessionCommand, CreateCheckoutSessionHandler, CreateCheckoutSessionResult,
};
pub use create_portal_session::{
    CreatePortalSessionCommand, CreatePortalSessionHandler, CreatePortalSessionResult,
};
