//! Payment ledger aggregate.
//!
//! One Payment exists per provider transaction id (payment intent id when
//! present, invoice id otherwise). At-least-once delivery means the same
//! transaction id can arrive repeatedly; upserts key on it so redelivery
//! updates the existing record instead of duplicating it.

use crate::domain::foundation::{Money, PaymentId, StateMachine, SubscriptionId, Timestamp, UserId};
use serde::{Deserialize, Serialize};

/// How a payment was collected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Card,
    BankTransfer,
    Wallet,
    /// Provider did not report a recognizable method.
    Unknown,
}

impl PaymentMethod {
    /// Parses a stored method string.
    pub fn from_stored(s: &str) -> Option<Self> {
        match s {
            "card" => Some(PaymentMethod::Card),
            "bank_transfer" => Some(PaymentMethod::BankTransfer),
            "wallet" => Some(PaymentMethod::Wallet),
            "unknown" => Some(PaymentMethod::Unknown),
            _ => None,
        }
    }

    /// Returns the storage string for this method.
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Card => "card",
            PaymentMethod::BankTransfer => "bank_transfer",
            PaymentMethod::Wallet => "wallet",
            PaymentMethod::Unknown => "unknown",
        }
    }
}

/// Payment transaction status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// Recorded but not yet submitted for collection.
    Pending,

    /// Submitted; provider outcome not yet known.
    Processing,

    /// Collected. Terminal except for refunds.
    Success,

    /// Collection failed. Terminal.
    Failed,

    /// Collected then returned. Terminal.
    Refunded,
}

impl PaymentStatus {
    /// Parses a stored status string.
    pub fn from_stored(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(PaymentStatus::Pending),
            "processing" => Some(PaymentStatus::Processing),
            "success" => Some(PaymentStatus::Success),
            "failed" => Some(PaymentStatus::Failed),
            "refunded" => Some(PaymentStatus::Refunded),
            _ => None,
        }
    }

    /// Returns the storage string for this status.
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Processing => "processing",
            PaymentStatus::Success => "success",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Refunded => "refunded",
        }
    }
}

impl StateMachine for PaymentStatus {
    fn can_transition_to(&self, target: &Self) -> bool {
        use PaymentStatus::*;
        matches!(
            (self, target),
            (Pending, Processing)
                | (Pending, Success)
                | (Pending, Failed)
                | (Processing, Success)
                | (Processing, Failed)
                | (Success, Refunded)
        )
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use PaymentStatus::*;
        match self {
            Pending => vec![Processing, Success, Failed],
            Processing => vec![Success, Failed],
            Success => vec![Refunded],
            Failed => vec![],
            Refunded => vec![],
        }
    }
}

/// Field set for an idempotent payment upsert, keyed on
/// `provider_transaction_id`.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentFields {
    pub user_id: UserId,
    pub subscription_id: Option<SubscriptionId>,
    pub amount: Money,
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    pub provider_transaction_id: String,
    pub paid_at: Timestamp,
    pub failure_reason: Option<String>,
}

impl PaymentFields {
    /// Materializes these fields as a fresh Payment record.
    pub fn into_payment(self, id: PaymentId) -> Payment {
        let now = Timestamp::now();
        Payment {
            id,
            user_id: self.user_id,
            subscription_id: self.subscription_id,
            amount: self.amount,
            method: self.method,
            status: self.status,
            provider_transaction_id: self.provider_transaction_id,
            paid_at: self.paid_at,
            failure_reason: self.failure_reason,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Payment aggregate - one collected (or attempted) charge.
///
/// # Invariants
///
/// - `provider_transaction_id` is unique; it is the idempotency key
/// - a `success` record is never downgraded by redelivery
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    /// Unique ledger identifier.
    pub id: PaymentId,

    /// User the charge belongs to.
    pub user_id: UserId,

    /// Subscription the charge renews, when known.
    pub subscription_id: Option<SubscriptionId>,

    /// Charged amount in decimal major units with its currency.
    pub amount: Money,

    /// Collection method.
    pub method: PaymentMethod,

    /// Transaction outcome.
    pub status: PaymentStatus,

    /// Provider transaction id (payment intent id, else invoice id).
    pub provider_transaction_id: String,

    /// When the provider recorded the charge.
    pub paid_at: Timestamp,

    /// Provider-reported decline reason, when collection failed.
    pub failure_reason: Option<String>,

    /// When the ledger record was created.
    pub created_at: Timestamp,

    /// When the ledger record was last written.
    pub updated_at: Timestamp,
}

impl Payment {
    /// Returns true if this charge was collected.
    pub fn is_successful(&self) -> bool {
        self.status == PaymentStatus::Success
    }

    /// Returns true if the status can no longer change (modeled lifecycle;
    /// `success` still admits a refund).
    pub fn is_settled(&self) -> bool {
        self.status.is_terminal()
    }
}
