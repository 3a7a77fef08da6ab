//! In-memory processed-event log.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::foundation::Timestamp;
use crate::ports::{LedgerError, ProcessedEventLog, ProcessedEventRecord, SaveResult};

/// In-memory implementation of [`ProcessedEventLog`] for tests and local
/// runs. Mirrors the database adapter's save semantics: settled records win
/// races, failed records are overwritten on reprocess.
pub struct InMemoryProcessedEventLog {
    records: Mutex<HashMap<String, ProcessedEventRecord>>,
}

impl InMemoryProcessedEventLog {
    /// Creates an empty log.
    pub fn new() -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
        }
    }

    /// Number of records in the log.
    pub async fn record_count(&self) -> usize {
        self.records.lock().await.len()
    }

    /// Fetches a record by event id without going through the port.
    pub async fn find(&self, event_id: &str) -> Option<ProcessedEventRecord> {
        self.records.lock().await.get(event_id).cloned()
    }
}

impl Default for InMemoryProcessedEventLog {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProcessedEventLog for InMemoryProcessedEventLog {
    async fn find_by_event_id(
        &self,
        event_id: &str,
    ) -> Result<Option<ProcessedEventRecord>, LedgerError> {
        Ok(self.records.lock().await.get(event_id).cloned())
    }

    async fn save(&self, record: ProcessedEventRecord) -> Result<SaveResult, LedgerError> {
        let mut records = self.records.lock().await;
        match records.get(&record.event_id) {
            Some(existing) if existing.is_settled() => Ok(SaveResult::AlreadyExists),
            _ => {
                records.insert(record.event_id.clone(), record);
                Ok(SaveResult::Inserted)
            }
        }
    }

    async fn delete_before(&self, cutoff: Timestamp) -> Result<u64, LedgerError> {
        let mut records = self.records.lock().await;
        let before = records.len();
        records.retain(|_, r| !r.processed_at.is_before(&cutoff));
        Ok((before - records.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::ProcessedOutcome;

    #[tokio::test]
    async fn find_returns_none_for_new_event() {
        let log = InMemoryProcessedEventLog::new();

        let found = log.find_by_event_id("evt_new").await.unwrap();

        assert!(found.is_none());
    }

    #[tokio::test]
    async fn save_then_find_roundtrips() {
        let log = InMemoryProcessedEventLog::new();
        let record =
            ProcessedEventRecord::success("evt_1", "invoice.paid", serde_json::json!({}));

        let result = log.save(record).await.unwrap();
        assert_eq!(result, SaveResult::Inserted);

        let found = log.find_by_event_id("evt_1").await.unwrap().unwrap();
        assert_eq!(found.outcome, ProcessedOutcome::Success);
    }

    #[tokio::test]
    async fn settled_record_wins_the_race() {
        let log = InMemoryProcessedEventLog::new();
        log.save(ProcessedEventRecord::success(
            "evt_race",
            "invoice.paid",
            serde_json::json!({}),
        ))
        .await
        .unwrap();

        let second = log
            .save(ProcessedEventRecord::success(
                "evt_race",
                "invoice.paid",
                serde_json::json!({}),
            ))
            .await
            .unwrap();

        assert_eq!(second, SaveResult::AlreadyExists);
    }

    #[tokio::test]
    async fn failed_record_is_overwritten_on_reprocess() {
        let log = InMemoryProcessedEventLog::new();
        log.save(ProcessedEventRecord::failed(
            "evt_retry",
            "invoice.paid",
            "database error: timeout",
            serde_json::json!({}),
        ))
        .await
        .unwrap();

        let result = log
            .save(ProcessedEventRecord::success(
                "evt_retry",
                "invoice.paid",
                serde_json::json!({}),
            ))
            .await
            .unwrap();

        assert_eq!(result, SaveResult::Inserted);
        let found = log.find_by_event_id("evt_retry").await.unwrap().unwrap();
        assert_eq!(found.outcome, ProcessedOutcome::Success);
    }

    #[tokio::test]
    async fn delete_before_removes_only_old_records() {
        let log = InMemoryProcessedEventLog::new();
        let mut old = ProcessedEventRecord::success("evt_old", "invoice.paid", serde_json::json!({}));
        old.processed_at = Timestamp::now().plus_days(-60);
        let fresh = ProcessedEventRecord::success("evt_fresh", "invoice.paid", serde_json::json!({}));

        log.save(old).await.unwrap();
        log.save(fresh).await.unwrap();

        let cutoff = Timestamp::now().plus_days(-30);
        let deleted = log.delete_before(cutoff).await.unwrap();

        assert_eq!(deleted, 1);
        assert!(log.find_by_event_id("evt_old").await.unwrap().is_none());
        assert!(log.find_by_event_id("evt_fresh").await.unwrap().is_some());
    }
}
