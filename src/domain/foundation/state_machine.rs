//! State machine trait for status enums.
//!
//! The reconciliation handlers mirror the payment provider's reported status
//! verbatim rather than gating writes on local lifecycle rules, so this trait
//! only *models* the lifecycle: handlers consult it to WARN about transitions
//! that leave the modeled graph, never to block them.

/// Trait for status enums that represent state machines.
///
/// Implementors define the modeled transition graph and get terminality
/// checks for free.
///
/// # Example
///
/// ```ignore
/// impl StateMachine for SubscriptionStatus {
///     fn can_transition_to(&self, target: &Self) -> bool {
///         matches!(
///             (self, target),
///             (Trialing, Active) |
///             (Active, PastDue) |
///             // ... etc
///         )
///     }
///
///     fn valid_transitions(&self) -> Vec<Self> {
///         match self {
///             Trialing => vec![Active, Canceled],
///             Active => vec![PastDue, Paused, Canceled],
///             // ... etc
///         }
///     }
/// }
///
/// // Usage:
/// if !current.can_transition_to(&reported) {
///     tracing::warn!(?current, ?reported, "transition outside modeled lifecycle");
/// }
/// ```
pub trait StateMachine: Sized + Copy + PartialEq + std::fmt::Debug {
    /// Returns true if a transition from self to target stays inside the
    /// modeled lifecycle.
    fn can_transition_to(&self, target: &Self) -> bool;

    /// Returns all modeled target states from the current state.
    fn valid_transitions(&self) -> Vec<Self>;

    /// Checks if the current state is terminal (no modeled outgoing transitions).
    fn is_terminal(&self) -> bool {
        self.valid_transitions().is_empty()
    }
}
