//! ProcessWebhookHandler - the inbound webhook pipeline.
//!
//! Verify, deduplicate, dispatch, record. Signature verification runs first
//! and nothing unverified reaches a handler or the audit log. Deduplication
//! keys on the provider event id: settled outcomes (success, ignored) turn
//! redeliveries into acknowledgements, while failed outcomes are reprocessed
//! because our own 5xx answer asked the provider to retry.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::application::router::{EventRouter, Outcome};
use crate::domain::billing::{EventVerifier, ProviderEvent, WebhookError};
use crate::ports::{ProcessedEventLog, ProcessedEventRecord, SaveResult, WebhookResult};

/// Command to process one webhook delivery.
#[derive(Debug, Clone)]
pub struct ProcessWebhookCommand {
    /// Raw request body, exactly as received.
    pub payload: Vec<u8>,
    /// Signature header value.
    pub signature: String,
}

/// Handler for inbound webhook deliveries.
pub struct ProcessWebhookHandler {
    verifier: EventVerifier,
    router: EventRouter,
    event_log: Arc<dyn ProcessedEventLog>,
}

impl ProcessWebhookHandler {
    pub fn new(
        verifier: EventVerifier,
        router: EventRouter,
        event_log: Arc<dyn ProcessedEventLog>,
    ) -> Self {
        Self {
            verifier,
            router,
            event_log,
        }
    }

    /// Verifies the delivery and processes the event.
    pub async fn handle(
        &self,
        cmd: ProcessWebhookCommand,
    ) -> Result<WebhookResult, WebhookError> {
        let event = self.verifier.verify_and_parse(&cmd.payload, &cmd.signature)?;
        self.process_event(&event).await
    }

    /// Deduplicates, dispatches, and records an already verified event.
    pub async fn process_event(
        &self,
        event: &ProviderEvent,
    ) -> Result<WebhookResult, WebhookError> {
        if let Some(existing) = self.event_log.find_by_event_id(&event.id).await? {
            if existing.is_settled() {
                debug!(
                    event_id = %event.id,
                    outcome = existing.outcome.as_str(),
                    "event already settled, acknowledging redelivery"
                );
                return Ok(WebhookResult::AlreadyProcessed);
            }
            info!(event_id = %event.id, "reprocessing previously failed event");
        }

        let record = match self.router.dispatch(event).await {
            Ok(Outcome::Applied) => ProcessedEventRecord::success(
                event.id.as_str(),
                event.event_type.as_str(),
                event.raw.clone(),
            ),
            Ok(Outcome::Ignored(reason)) => ProcessedEventRecord::ignored(
                event.id.as_str(),
                event.event_type.as_str(),
                reason,
                event.raw.clone(),
            ),
            Err(error) => {
                let record = ProcessedEventRecord::failed(
                    event.id.as_str(),
                    event.event_type.as_str(),
                    error.to_string(),
                    event.raw.clone(),
                );
                // Best-effort: the failure itself is what the boundary must
                // report, even if the audit write also fails.
                if let Err(save_error) = self.event_log.save(record).await {
                    warn!(
                        event_id = %event.id,
                        error = %save_error,
                        "could not record failed outcome"
                    );
                }
                return Err(error);
            }
        };

        match self.event_log.save(record).await? {
            SaveResult::Inserted => Ok(WebhookResult::Processed),
            SaveResult::AlreadyExists => {
                debug!(
                    event_id = %event.id,
                    "concurrent delivery settled this event first"
                );
                Ok(WebhookResult::AlreadyProcessed)
            }
        }
    }
}
