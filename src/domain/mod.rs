//! Domain layer containing business logic and domain types.
//!
//! # Module Organization
//!
//! - `foundation` - Shared domain primitives (value objects, IDs, traits)
//! - `billing` - Subscription/payment ledger aggregates, the provider event
//!   envelope, webhook verification, and event routing

pub mod billing;
pub mod foundation;
