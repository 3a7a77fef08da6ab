//! ProcessedEventLog port - Interface for the webhook audit/dedup log.
//!
//! The provider delivers at-least-once: timeouts, 5xx answers, and lost
//! acknowledgements all trigger redelivery. This log records every event
//! we have seen together with its outcome and original payload, and its
//! uniqueness on the provider event id is what turns redeliveries into
//! cheap no-ops instead of repeated ledger work.

use async_trait::async_trait;
use serde_json::Value;

use super::ledger_store::LedgerError;
use crate::domain::foundation::Timestamp;

/// Outcome recorded for a processed event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessedOutcome {
    /// Handler applied ledger writes.
    Success,
    /// Event acknowledged without ledger writes (with a reason).
    Ignored,
    /// Handler failed; the boundary answered 5xx and the provider retries.
    Failed,
}

impl ProcessedOutcome {
    /// Parses a stored outcome value.
    pub fn from_stored(s: &str) -> Option<Self> {
        match s {
            "success" => Some(Self::Success),
            "ignored" => Some(Self::Ignored),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Returns the stored representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Ignored => "ignored",
            Self::Failed => "failed",
        }
    }
}

/// Record of a processed webhook event.
#[derive(Debug, Clone)]
pub struct ProcessedEventRecord {
    /// Provider event id (evt_xxx); the dedup key.
    pub event_id: String,

    /// Wire event type tag (e.g. "invoice.paid").
    pub event_type: String,

    /// When this outcome was recorded.
    pub processed_at: Timestamp,

    /// How processing ended.
    pub outcome: ProcessedOutcome,

    /// Ignore reason or failure message, depending on outcome.
    pub detail: Option<String>,

    /// Original event envelope, for replay and debugging.
    pub payload: Value,
}

impl ProcessedEventRecord {
    /// Creates a success record.
    pub fn success(
        event_id: impl Into<String>,
        event_type: impl Into<String>,
        payload: Value,
    ) -> Self {
        Self {
            event_id: event_id.into(),
            event_type: event_type.into(),
            processed_at: Timestamp::now(),
            outcome: ProcessedOutcome::Success,
            detail: None,
            payload,
        }
    }

    /// Creates an ignored record with the reason the event was skipped.
    pub fn ignored(
        event_id: impl Into<String>,
        event_type: impl Into<String>,
        reason: impl Into<String>,
        payload: Value,
    ) -> Self {
        Self {
            event_id: event_id.into(),
            event_type: event_type.into(),
            processed_at: Timestamp::now(),
            outcome: ProcessedOutcome::Ignored,
            detail: Some(reason.into()),
            payload,
        }
    }

    /// Creates a failure record with the error that stopped processing.
    pub fn failed(
        event_id: impl Into<String>,
        event_type: impl Into<String>,
        error: impl Into<String>,
        payload: Value,
    ) -> Self {
        Self {
            event_id: event_id.into(),
            event_type: event_type.into(),
            processed_at: Timestamp::now(),
            outcome: ProcessedOutcome::Failed,
            detail: Some(error.into()),
            payload,
        }
    }

    /// Whether this record closes the event. Failed records do not: the
    /// boundary answered 5xx, so the provider's redelivery is deliberate
    /// and must be reprocessed.
    pub fn is_settled(&self) -> bool {
        !matches!(self.outcome, ProcessedOutcome::Failed)
    }
}

/// Result of attempting to save a processed-event record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveResult {
    /// Record was written (first delivery, or a reprocessed failure).
    Inserted,
    /// A settled record already exists; a concurrent delivery won the race.
    AlreadyExists,
}

/// Result of webhook processing, as reported to the HTTP boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookResult {
    /// Event was dispatched and its outcome recorded.
    Processed,
    /// Event was already settled by an earlier delivery.
    AlreadyProcessed,
}

/// Port for the processed-event audit log.
///
/// Implementations must enforce uniqueness on `event_id` in storage;
/// concurrent deliveries of one event race on `save` and exactly one may
/// win.
#[async_trait]
pub trait ProcessedEventLog: Send + Sync {
    /// Finds a previously recorded event by provider event id.
    async fn find_by_event_id(
        &self,
        event_id: &str,
    ) -> Result<Option<ProcessedEventRecord>, LedgerError>;

    /// Attempts to save a record.
    ///
    /// Returns `Inserted` when the record was written; an existing `failed`
    /// record is overwritten and also counts as `Inserted`, because the
    /// event genuinely was reprocessed. Returns `AlreadyExists` when a
    /// settled record for this event id is already present.
    async fn save(&self, record: ProcessedEventRecord) -> Result<SaveResult, LedgerError>;

    /// Deletes records older than the cutoff. Returns how many were removed.
    async fn delete_before(&self, cutoff: Timestamp) -> Result<u64, LedgerError>;
}
