//! Event routing - maps provider event types to reconciliation handlers.
//!
//! The routing table is plain data built once at startup from the handler
//! set; there is no global registry and nothing mutates after construction.
//! Dispatch for an unregistered event type is a success (we acknowledge so
//! the provider stops redelivering), never an error.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use crate::domain::billing::{ProviderEvent, ProviderEventType, WebhookError};

/// Outcome of handling a single event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Ledger writes were applied.
    Applied,
    /// Event acknowledged without ledger writes, with the reason.
    Ignored(String),
}

impl Outcome {
    /// Convenience constructor for the ignored case.
    pub fn ignored(reason: impl Into<String>) -> Self {
        Outcome::Ignored(reason.into())
    }
}

/// A handler that reconciles one or more provider event types against the
/// ledger.
///
/// Handlers must be idempotent and convergent: reapplying a delivered event,
/// in any interleaving with other deliveries, must land the ledger in the
/// same state.
#[async_trait]
pub trait ReconciliationHandler: Send + Sync {
    /// Event types this handler reconciles.
    fn handles(&self) -> Vec<ProviderEventType>;

    /// Applies the event against the ledger.
    async fn handle(&self, event: &ProviderEvent) -> Result<Outcome, WebhookError>;

    /// Stable handler name for logs and audit records.
    fn name(&self) -> &'static str;
}

/// Immutable routing table from event type to handler.
pub struct EventRouter {
    routes: HashMap<ProviderEventType, Arc<dyn ReconciliationHandler>>,
}

impl EventRouter {
    /// Builds the routing table. Each handler is registered under every
    /// event type it reports via [`ReconciliationHandler::handles`]; a later
    /// handler claiming an already-routed type replaces the earlier one.
    pub fn new(handlers: Vec<Arc<dyn ReconciliationHandler>>) -> Self {
        let mut routes: HashMap<ProviderEventType, Arc<dyn ReconciliationHandler>> =
            HashMap::new();
        for handler in handlers {
            for event_type in handler.handles() {
                routes.insert(event_type, Arc::clone(&handler));
            }
        }
        Self { routes }
    }

    /// Dispatches an event to its registered handler.
    ///
    /// An unregistered event type is acknowledged as ignored; the provider
    /// must never be told to retry an event type we deliberately do not
    /// process.
    pub async fn dispatch(&self, event: &ProviderEvent) -> Result<Outcome, WebhookError> {
        match self.routes.get(&event.event_type) {
            Some(handler) => {
                tracing::debug!(
                    event_id = %event.id,
                    event_type = %event.event_type,
                    handler = handler.name(),
                    "dispatching event"
                );
                handler.handle(event).await
            }
            None => {
                warn!(
                    event_id = %event.id,
                    event_type = %event.event_type,
                    "no handler registered for event type, acknowledging"
                );
                Ok(Outcome::ignored(format!(
                    "no handler for event type {}",
                    event.event_type
                )))
            }
        }
    }

    /// Event types with a registered handler.
    pub fn registered_types(&self) -> Vec<ProviderEventType> {
        self.routes.keys().cloned().collect()
    }
}
