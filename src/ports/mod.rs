//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the domain and the outside world. Adapters implement these ports.
//!
//! ## Ledger Ports
//!
//! - `LedgerStore` / `LedgerTransaction` - Billing aggregates with
//!   transactional write scopes
//! - `PlanCatalog` - Plan lookups by internal id or provider price id
//! - `ProcessedEventLog` - Webhook idempotency and audit trail
//!
//! ## Provider Ports
//!
//! - `BillingProvider` - Checkout/portal sessions and reconciliation
//!   point queries

mod billing_provider;
mod ledger_store;
mod plan_catalog;
mod processed_event_log;

pub use billing_provider::{
    BillingProvider, CheckoutSession, CheckoutSessionRequest, PaymentIntent, PortalSession,
    ProviderError,
};
pub use ledger_store::{LedgerError, LedgerStore, LedgerTransaction};
pub use plan_catalog::PlanCatalog;
pub use processed_event_log::{
    ProcessedEventLog, ProcessedEventRecord, ProcessedOutcome, SaveResult, WebhookResult,
};
