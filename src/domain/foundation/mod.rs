//! Foundation module - Shared domain primitives.
//!
//! Contains value objects, identifiers, and traits that form the
//! vocabulary of the billing domain.

mod ids;
mod money;
mod state_machine;
mod timestamp;

pub use ids::{PaymentId, PlanId, SubscriptionId, UserId};
pub use money::Money;
pub use state_machine::StateMachine;
pub use timestamp::Timestamp;
