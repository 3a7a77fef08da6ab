//! PostgreSQL-backed processed-event log.
//!
//! The `webhook_events` table's primary key on `event_id` is the dedup
//! guarantee: concurrent deliveries of one event race on the insert and
//! exactly one wins. A stored `failed` outcome is not settled, so the
//! conflict action overwrites it and the save still counts as an insert.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::PgPool;

use crate::domain::foundation::Timestamp;
use crate::ports::{
    LedgerError, ProcessedEventLog, ProcessedEventRecord, ProcessedOutcome, SaveResult,
};

/// PostgreSQL implementation of the [`ProcessedEventLog`] port.
pub struct PostgresProcessedEventLog {
    pool: PgPool,
}

impl PostgresProcessedEventLog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct EventRow {
    event_id: String,
    event_type: String,
    outcome: String,
    detail: Option<String>,
    payload: Value,
    processed_at: DateTime<Utc>,
}

impl TryFrom<EventRow> for ProcessedEventRecord {
    type Error = LedgerError;

    fn try_from(row: EventRow) -> Result<Self, Self::Error> {
        let outcome = ProcessedOutcome::from_stored(&row.outcome).ok_or_else(|| {
            LedgerError::Database(format!("invalid event outcome: {}", row.outcome))
        })?;

        Ok(ProcessedEventRecord {
            event_id: row.event_id,
            event_type: row.event_type,
            processed_at: Timestamp::from_datetime(row.processed_at),
            outcome,
            detail: row.detail,
            payload: row.payload,
        })
    }
}

fn db_error(e: sqlx::Error) -> LedgerError {
    LedgerError::Database(e.to_string())
}

#[async_trait]
impl ProcessedEventLog for PostgresProcessedEventLog {
    async fn find_by_event_id(
        &self,
        event_id: &str,
    ) -> Result<Option<ProcessedEventRecord>, LedgerError> {
        let row: Option<EventRow> = sqlx::query_as(
            r#"
            SELECT event_id, event_type, outcome, detail, payload, processed_at
            FROM webhook_events WHERE event_id = $1
            "#,
        )
        .bind(event_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;

        row.map(ProcessedEventRecord::try_from).transpose()
    }

    async fn save(&self, record: ProcessedEventRecord) -> Result<SaveResult, LedgerError> {
        let written: Option<(String,)> = sqlx::query_as(
            r#"
            INSERT INTO webhook_events (
                event_id, event_type, outcome, detail, payload, processed_at
            ) VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (event_id) DO UPDATE SET
                event_type = EXCLUDED.event_type,
                outcome = EXCLUDED.outcome,
                detail = EXCLUDED.detail,
                payload = EXCLUDED.payload,
                processed_at = EXCLUDED.processed_at
            WHERE webhook_events.outcome = 'failed'
            RETURNING event_id
            "#,
        )
        .bind(&record.event_id)
        .bind(&record.event_type)
        .bind(record.outcome.as_str())
        .bind(record.detail.as_deref())
        .bind(&record.payload)
        .bind(record.processed_at.as_datetime())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(match written {
            Some(_) => SaveResult::Inserted,
            None => SaveResult::AlreadyExists,
        })
    }

    async fn delete_before(&self, cutoff: Timestamp) -> Result<u64, LedgerError> {
        let result = sqlx::query("DELETE FROM webhook_events WHERE processed_at < $1")
            .bind(cutoff.as_datetime())
            .execute(&self.pool)
            .await
            .map_err(db_error)?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_row_maps_to_record() {
        let row = EventRow {
            event_id: "evt_1".to_string(),
            event_type: "invoice.paid".to_string(),
            outcome: "ignored".to_string(),
            detail: Some("payment already settled".to_string()),
            payload: serde_json::json!({"id": "evt_1"}),
            processed_at: Utc::now(),
        };

        let record = ProcessedEventRecord::try_from(row).unwrap();

        assert_eq!(record.outcome, ProcessedOutcome::Ignored);
        assert_eq!(record.detail.as_deref(), Some("payment already settled"));
        assert!(record.is_settled());
    }

    #[test]
    fn event_row_rejects_unknown_outcome() {
        let row = EventRow {
            event_id: "evt_1".to_string(),
            event_type: "invoice.paid".to_string(),
            outcome: "shrugged".to_string(),
            detail: None,
            payload: Value::Null,
            processed_at: Utc::now(),
        };

        assert!(matches!(
            ProcessedEventRecord::try_from(row),
            Err(LedgerError::Database(_))
        ));
    }
}
