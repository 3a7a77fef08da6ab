//! Application handlers.
//!
//! Command handlers that orchestrate domain operations: the outbound billing
//! session flows and the per-event reconciliation handlers dispatched by the
//! webhook router.

pub mod billing;
pub mod reconciliation;

pub use billing::{
    CreateCheckoutSessionCommand, CreateCheckoutSessionHandler, CreateCheckoutSessionResult,
    CreatePortalSessionCommand, CreatePortalSessionHandler, CreatePortalSessionResult,
};
pub use reconciliation::reconciliation_handlers;
