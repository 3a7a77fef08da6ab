//! Application layer - command handlers and webhook orchestration.
//!
//! This layer coordinates domain operations across ports: the webhook
//! processor drives verify → dedup → route → record, the router fans events
//! out to reconciliation handlers, the billing handlers serve the
//! user-initiated checkout and portal flows, and the retention sweeper keeps
//! the processed-event log bounded.

pub mod handlers;
pub mod process_webhook;
pub mod retention;
pub mod router;

pub use handlers::{
    reconciliation_handlers, CreateCheckoutSessionCommand, CreateCheckoutSessionHandler,
    CreatePortalSessionCommand, CreatePortalSessionHandler,
};
pub use process_webhook::{ProcessWebhookCommand, ProcessWebhookHandler};
pub use retention::{RetentionConfig, RetentionSweeper};
pub use router::{EventRouter, Outcome, ReconciliationHandler};
