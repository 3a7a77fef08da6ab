//! PostgreSQL adapters - Database implementations for storage ports.
//!
//! This module provides adapters for PostgreSQL-backed persistence:
//! - `PostgresLedgerStore` - Billing ledger with transactional write guards
//! - `PostgresPlanCatalog` - Read-only plan catalog lookups
//! - `PostgresProcessedEventLog` - Webhook dedup/audit log

mod ledger_store;
mod plan_catalog;
mod processed_event_log;

pub use ledger_store::PostgresLedgerStore;
pub use plan_catalog::PostgresPlanCatalog;
pub use processed_event_log::PostgresProcessedEventLog;
