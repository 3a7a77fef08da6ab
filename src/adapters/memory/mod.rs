//! In-memory adapters.
//!
//! Full implementations of the ledger-side ports over process-local state.
//! They satisfy the same contracts as the Postgres adapters (including
//! transactional rollback and save-race semantics) and back the unit and
//! integration test suites, plus local runs without a database.

mod ledger_store;
mod plan_catalog;
mod processed_event_log;

pub use ledger_store::InMemoryLedgerStore;
pub use plan_catalog::InMemoryPlanCatalog;
pub use processed_event_log::InMemoryProcessedEventLog;
