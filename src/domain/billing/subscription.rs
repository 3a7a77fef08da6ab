//! Subscription ledger aggregate.
//!
//! One Subscription exists per provider subscription id; that id is the sole
//! correlation key between the provider's records and the local ledger.
//! Subscriptions are never physically deleted, only transitioned into the
//! terminal `canceled` status.
//!
//! # Design Decisions
//!
//! - **Status is mirrored, not inferred**: handlers write the provider's
//!   reported status verbatim; the state machine below only flags transitions
//!   that leave the modeled lifecycle.
//! - **Minimal deltas**: reconciliation computes a [`SubscriptionChanges`]
//!   diff and writes only the fields that actually changed, making duplicate
//!   deliveries no-ops.

use crate::domain::foundation::{PlanId, StateMachine, SubscriptionId, Timestamp, UserId};
use serde::{Deserialize, Serialize};

/// Subscription status, matching the provider's lifecycle vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    /// Created but first payment not yet confirmed.
    Incomplete,

    /// First payment window elapsed without confirmation.
    IncompleteExpired,

    /// In a free trial period.
    Trialing,

    /// Paid up; full access.
    Active,

    /// A renewal payment failed; provider is retrying.
    PastDue,

    /// Collection paused by the customer or an operator.
    Paused,

    /// Retries exhausted without payment.
    Unpaid,

    /// Terminated. Terminal state.
    Canceled,
}

impl SubscriptionStatus {
    /// Parses a provider status string.
    pub fn from_provider(s: &str) -> Option<Self> {
        match s {
            "incomplete" => Some(SubscriptionStatus::Incomplete),
            "incomplete_expired" => Some(SubscriptionStatus::IncompleteExpired),
            "trialing" => Some(SubscriptionStatus::Trialing),
            "active" => Some(SubscriptionStatus::Active),
            "past_due" => Some(SubscriptionStatus::PastDue),
            "paused" => Some(SubscriptionStatus::Paused),
            "unpaid" => Some(SubscriptionStatus::Unpaid),
            "canceled" => Some(SubscriptionStatus::Canceled),
            _ => None,
        }
    }

    /// Returns the provider wire string for this status.
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Incomplete => "incomplete",
            SubscriptionStatus::IncompleteExpired => "incomplete_expired",
            SubscriptionStatus::Trialing => "trialing",
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::PastDue => "past_due",
            SubscriptionStatus::Paused => "paused",
            SubscriptionStatus::Unpaid => "unpaid",
            SubscriptionStatus::Canceled => "canceled",
        }
    }

    /// Returns true if this status grants streaming access.
    pub fn grants_access(&self) -> bool {
        matches!(
            self,
            SubscriptionStatus::Active | SubscriptionStatus::Trialing
        )
    }
}

impl StateMachine for SubscriptionStatus {
    fn can_transition_to(&self, target: &Self) -> bool {
        use SubscriptionStatus::*;
        matches!(
            (self, target),
            // From INCOMPLETE
            (Incomplete, Active)
                | (Incomplete, Trialing)
                | (Incomplete, IncompleteExpired)
                | (Incomplete, Canceled)
            // From INCOMPLETE_EXPIRED
                | (IncompleteExpired, Canceled)
            // From TRIALING
                | (Trialing, Active)
                | (Trialing, PastDue)
                | (Trialing, Paused)
                | (Trialing, Canceled)
            // From ACTIVE
                | (Active, Active) // Renewal
                | (Active, PastDue)
                | (Active, Paused)
                | (Active, Unpaid)
                | (Active, Canceled)
            // From PAST_DUE
                | (PastDue, Active)
                | (PastDue, Unpaid)
                | (PastDue, Canceled)
            // From PAUSED
                | (Paused, Active)
                | (Paused, Canceled)
            // From UNPAID
                | (Unpaid, Active)
                | (Unpaid, Canceled)
        )
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use SubscriptionStatus::*;
        match self {
            Incomplete => vec![Active, Trialing, IncompleteExpired, Canceled],
            IncompleteExpired => vec![Canceled],
            Trialing => vec![Active, PastDue, Paused, Canceled],
            Active => vec![Active, PastDue, Paused, Unpaid, Canceled],
            PastDue => vec![Active, Unpaid, Canceled],
            Paused => vec![Active, Canceled],
            Unpaid => vec![Active, Canceled],
            Canceled => vec![],
        }
    }
}

/// Partial update for a Subscription; `None` fields are left untouched.
///
/// Reconciliation writes flow through this type so that duplicate provider
/// deliveries diff to an empty change set and skip the write entirely.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubscriptionChanges {
    pub status: Option<SubscriptionStatus>,
    pub plan_id: Option<PlanId>,
    pub next_billing_date: Option<Timestamp>,
    pub last_payment_date: Option<Timestamp>,
    pub cancel_at_period_end: Option<bool>,
    pub canceled_at: Option<Timestamp>,
}

impl SubscriptionChanges {
    /// Returns true if no field would be written.
    pub fn is_empty(&self) -> bool {
        self.status.is_none()
            && self.plan_id.is_none()
            && self.next_billing_date.is_none()
            && self.last_payment_date.is_none()
            && self.cancel_at_period_end.is_none()
            && self.canceled_at.is_none()
    }
}

/// Subscription aggregate - the local mirror of one provider subscription.
///
/// # Invariants
///
/// - `provider_subscription_id` is globally unique (exactly one aggregate
///   per provider subscription)
/// - `canceled` is terminal; a canceled subscription is never deleted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subscription {
    /// Unique ledger identifier.
    pub id: SubscriptionId,

    /// User who owns this subscription.
    pub user_id: UserId,

    /// Catalog plan the subscription is billed against.
    pub plan_id: PlanId,

    /// Current status, mirrored from the provider.
    pub status: SubscriptionStatus,

    /// When the subscription started at the provider.
    pub start_date: Timestamp,

    /// When the next renewal invoice is due.
    pub next_billing_date: Timestamp,

    /// When the last successful payment landed, if any.
    pub last_payment_date: Option<Timestamp>,

    /// Provider-side flag: cancellation scheduled for period end.
    pub cancel_at_period_end: bool,

    /// Provider customer id.
    pub provider_customer_id: String,

    /// Provider subscription id; sole external correlation key.
    pub provider_subscription_id: String,

    /// When the subscription entered `canceled`, if it has.
    pub canceled_at: Option<Timestamp>,

    /// When the ledger record was created.
    pub created_at: Timestamp,

    /// When the ledger record was last written.
    pub updated_at: Timestamp,
}

impl Subscription {
    /// Creates a new Subscription from a provider snapshot.
    #[allow(clippy::too_many_arguments)]
    pub fn create(
        id: SubscriptionId,
        user_id: UserId,
        plan_id: PlanId,
        status: SubscriptionStatus,
        start_date: Timestamp,
        next_billing_date: Timestamp,
        provider_customer_id: String,
        provider_subscription_id: String,
    ) -> Self {
        let now = Timestamp::now();
        Self {
            id,
            user_id,
            plan_id,
            status,
            start_date,
            next_billing_date,
            last_payment_date: None,
            cancel_at_period_end: false,
            provider_customer_id,
            provider_subscription_id,
            canceled_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Returns true if the subscription currently grants access.
    pub fn is_active(&self) -> bool {
        self.status.grants_access()
    }

    /// Returns true if the subscription has reached its terminal state.
    pub fn is_canceled(&self) -> bool {
        self.status == SubscriptionStatus::Canceled
    }

    /// Computes the minimal delta between this record and a provider-reported
    /// snapshot of {status, plan, next billing date, cancel-at-period-end}.
    ///
    /// An unchanged snapshot (duplicate delivery) diffs to an empty change
    /// set. Entering `canceled` stamps `canceled_at`, matching the ledger's
    /// save hook.
    pub fn diff(
        &self,
        status: SubscriptionStatus,
        plan_id: PlanId,
        next_billing_date: Timestamp,
        cancel_at_period_end: bool,
    ) -> SubscriptionChanges {
        let mut changes = SubscriptionChanges::default();
        if self.status != status {
            changes.status = Some(status);
            if status == SubscriptionStatus::Canceled && self.canceled_at.is_none() {
                changes.canceled_at = Some(Timestamp::now());
            }
        }
        if self.plan_id != plan_id {
            changes.plan_id = Some(plan_id);
        }
        if self.next_billing_date != next_billing_date {
            changes.next_billing_date = Some(next_billing_date);
        }
        if self.cancel_at_period_end != cancel_at_period_end {
            changes.cancel_at_period_end = Some(cancel_at_period_end);
        }
        changes
    }

    /// Applies a change set to this record in place, stamping `updated_at`.
    ///
    /// Mechanical: writes exactly the fields present in `changes`.
    pub fn apply_changes(&mut self, changes: &SubscriptionChanges) {
        if let Some(status) = changes.status {
            self.status = status;
        }
        if let Some(plan_id) = changes.plan_id {
            self.plan_id = plan_id;
        }
        if let Some(next_billing_date) = changes.next_billing_date {
            self.next_billing_date = next_billing_date;
        }
        if let Some(last_payment_date) = changes.last_payment_date {
            self.last_payment_date = Some(last_payment_date);
        }
        if let Some(cancel_at_period_end) = changes.cancel_at_period_end {
            self.cancel_at_period_end = cancel_at_period_end;
        }
        if let Some(canceled_at) = changes.canceled_at {
            self.canceled_at = Some(canceled_at);
        }
        self.updated_at = Timestamp::now();
    }
}
