//! User billing profile aggregate.
//!
//! The billing-relevant slice of a user account: a nullable back-reference to
//! the currently active Subscription and the ordered set of the user's
//! Payment records. Account identity itself (email, credentials) lives
//! outside this engine.

use crate::domain::foundation::{PaymentId, SubscriptionId, Timestamp, UserId};
use serde::{Deserialize, Serialize};

/// Billing links for one user.
///
/// # Invariants
///
/// - `active_subscription_id`, when set, points at a Subscription owned by
///   this user
/// - the back-reference is cleared only when that specific subscription is
///   deleted/canceled, never as a side effect of another subscription's event
/// - `payment_ids` has set semantics with insertion order preserved
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillingProfile {
    /// User this profile belongs to.
    pub user_id: UserId,

    /// The user's current active subscription, if any.
    pub active_subscription_id: Option<SubscriptionId>,

    /// Payments recorded for this user, oldest first.
    pub payment_ids: Vec<PaymentId>,

    /// When the profile was last written.
    pub updated_at: Timestamp,
}

impl BillingProfile {
    /// Creates an empty profile for a user.
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            active_subscription_id: None,
            payment_ids: Vec::new(),
            updated_at: Timestamp::now(),
        }
    }

    /// Points the back-reference at the given subscription.
    pub fn link_active_subscription(&mut self, subscription_id: SubscriptionId) {
        self.active_subscription_id = Some(subscription_id);
        self.updated_at = Timestamp::now();
    }

    /// Clears the back-reference only if it points at the given subscription.
    ///
    /// Returns true if the reference was cleared. A reference to a different
    /// subscription is left untouched so that a late-arriving deletion event
    /// for an old subscription cannot unlink the user's current one.
    pub fn clear_active_subscription_if(&mut self, subscription_id: SubscriptionId) -> bool {
        if self.active_subscription_id == Some(subscription_id) {
            self.active_subscription_id = None;
            self.updated_at = Timestamp::now();
            true
        } else {
            false
        }
    }

    /// Appends a payment reference; duplicates are ignored.
    ///
    /// Returns true if the payment was newly added.
    pub fn add_payment(&mut self, payment_id: PaymentId) -> bool {
        if self.payment_ids.contains(&payment_id) {
            return false;
        }
        self.payment_ids.push(payment_id);
        self.updated_at = Timestamp::now();
        true
    }
}
