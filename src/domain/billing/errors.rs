//! Error types for webhook reconciliation and outbound session building.
//!
//! [`WebhookError`] covers everything that can go wrong between signature
//! verification and ledger commit, with HTTP status code mapping and
//! retryability semantics. The provider's retry loop is driven entirely by
//! the status code we answer with, so that mapping is load-bearing.
//! [`SessionError`] covers the user-initiated checkout and portal flows,
//! which answer a browser rather than a retrying webhook sender.

use axum::http::StatusCode;
use thiserror::Error;

use crate::ports::{LedgerError, ProviderError};

/// Errors that occur during webhook processing.
#[derive(Debug, Error)]
pub enum WebhookError {
    /// Signature verification failed: bad or missing signature, or an event
    /// timestamp outside the freshness window.
    #[error("Invalid signature")]
    SignatureInvalid,

    /// The envelope or a known event type's body failed to deserialize.
    #[error("Malformed payload: {0}")]
    PayloadMalformed(String),

    /// No signing secret configured; server misconfiguration.
    #[error("Webhook signing secret not configured")]
    ConfigMissing,

    /// Required correlation metadata field missing from the event.
    #[error("Missing metadata: {0}")]
    MetadataMissing(&'static str),

    /// The user referenced by the event's metadata does not exist.
    #[error("User not found")]
    UserNotFound,

    /// No subscription in the ledger for the event's provider subscription id.
    #[error("Subscription not found")]
    SubscriptionNotFound,

    /// No catalog plan for the event's provider price id (catalog drift).
    #[error("Plan not found")]
    PlanNotFound,

    /// Event was intentionally ignored (not an error condition).
    #[error("Event ignored: {0}")]
    Ignored(String),

    /// A point query against the payment provider failed.
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// A ledger store operation failed.
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),
}

impl WebhookError {
    /// Returns true if the provider should retry delivering this webhook.
    ///
    /// Retryable errors indicate temporary failures that may succeed on a
    /// later delivery (ledger issues, provider outages, eventual consistency
    /// between out-of-order events).
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            WebhookError::Provider(_)
                | WebhookError::Ledger(_)
                // An invoice event can arrive before the checkout event that
                // creates its subscription; the redelivery will find it.
                | WebhookError::SubscriptionNotFound
        )
    }

    /// Maps the error to the HTTP status code answered to the provider.
    ///
    /// Status codes determine the provider's retry behavior:
    /// - 2xx: event acknowledged, no retry
    /// - 4xx: client error, no retry
    /// - 5xx: server error, will retry
    pub fn status_code(&self) -> StatusCode {
        match self {
            // Auth failures - don't retry
            WebhookError::SignatureInvalid => StatusCode::UNAUTHORIZED,

            // Malformed or under-specified events, and references that only a
            // provider-side change could make resolvable - don't retry
            WebhookError::PayloadMalformed(_)
            | WebhookError::MetadataMissing(_)
            | WebhookError::UserNotFound
            | WebhookError::PlanNotFound => StatusCode::BAD_REQUEST,

            // Ignored events are acknowledged as success
            WebhookError::Ignored(_) => StatusCode::OK,

            // Server-side failures - will retry
            WebhookError::ConfigMissing
            | WebhookError::SubscriptionNotFound
            | WebhookError::Provider(_)
            | WebhookError::Ledger(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Errors from the outbound checkout and portal session flows.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The requested plan does not exist in the catalog.
    #[error("Plan not found")]
    PlanNotFound,

    /// The checkout session carries no customer id, so no portal session
    /// can be opened for it.
    #[error("Checkout session has no customer")]
    NoCustomer,

    /// The provider created a checkout session but returned no redirect URL.
    #[error("Checkout session has no redirect URL")]
    NoRedirectUrl,

    /// A call to the payment provider failed.
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// A catalog lookup failed.
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),
}

impl SessionError {
    /// Maps the error to the HTTP status code answered to the caller.
    pub fn status_code(&self) -> StatusCode {
        match self {
            SessionError::PlanNotFound => StatusCode::NOT_FOUND,
            SessionError::NoCustomer => StatusCode::BAD_REQUEST,
            SessionError::NoRedirectUrl | SessionError::Provider(_) => StatusCode::BAD_GATEWAY,
            SessionError::Ledger(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ══════════════════════════════════════════════════════════════
    // Error Display Tests
    // ══════════════════════════════════════════════════════════════

    #[test]
    fn signature_invalid_displays_correctly() {
        let err = WebhookError::SignatureInvalid;
        assert_eq!(format!("{}", err), "Invalid signature");
    }

    #[test]
    fn payload_malformed_displays_message() {
        let err = WebhookError::PayloadMalformed("invalid JSON".to_string());
        assert_eq!(format!("{}", err), "Malformed payload: invalid JSON");
    }

    #[test]
    fn metadata_missing_displays_field_name() {
        let err = WebhookError::MetadataMissing("user_id");
        assert_eq!(format!("{}", err), "Missing metadata: user_id");
    }

    #[test]
    fn ignored_displays_reason() {
        let err = WebhookError::Ignored("subscription already exists".to_string());
        assert_eq!(
            format!("{}", err),
            "Event ignored: subscription already exists"
        );
    }

    #[test]
    fn ledger_error_displays_source() {
        let err = WebhookError::from(LedgerError::Database("connection lost".to_string()));
        assert_eq!(format!("{}", err), "Ledger error: database error: connection lost");
    }

    // ══════════════════════════════════════════════════════════════
    // Retryability Tests
    // ══════════════════════════════════════════════════════════════

    #[test]
    fn ledger_error_is_retryable() {
        let err = WebhookError::from(LedgerError::Database("timeout".to_string()));
        assert!(err.is_retryable());
    }

    #[test]
    fn provider_error_is_retryable() {
        let err = WebhookError::from(ProviderError::Network("dns failure".to_string()));
        assert!(err.is_retryable());
    }

    #[test]
    fn subscription_not_found_is_retryable() {
        // Out-of-order delivery - the creating event may land first on retry
        let err = WebhookError::SubscriptionNotFound;
        assert!(err.is_retryable());
    }

    #[test]
    fn signature_invalid_is_not_retryable() {
        let err = WebhookError::SignatureInvalid;
        assert!(!err.is_retryable());
    }

    #[test]
    fn payload_malformed_is_not_retryable() {
        let err = WebhookError::PayloadMalformed("bad json".to_string());
        assert!(!err.is_retryable());
    }

    #[test]
    fn metadata_missing_is_not_retryable() {
        let err = WebhookError::MetadataMissing("plan_id");
        assert!(!err.is_retryable());
    }

    #[test]
    fn user_not_found_is_not_retryable() {
        let err = WebhookError::UserNotFound;
        assert!(!err.is_retryable());
    }

    #[test]
    fn plan_not_found_is_not_retryable() {
        let err = WebhookError::PlanNotFound;
        assert!(!err.is_retryable());
    }

    #[test]
    fn config_missing_is_not_retryable() {
        let err = WebhookError::ConfigMissing;
        assert!(!err.is_retryable());
    }

    #[test]
    fn ignored_is_not_retryable() {
        let err = WebhookError::Ignored("already processed".to_string());
        assert!(!err.is_retryable());
    }

    // ══════════════════════════════════════════════════════════════
    // Status Code Tests
    // ══════════════════════════════════════════════════════════════

    #[test]
    fn signature_invalid_returns_unauthorized() {
        let err = WebhookError::SignatureInvalid;
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn payload_malformed_returns_bad_request() {
        let err = WebhookError::PayloadMalformed("syntax error".to_string());
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn metadata_missing_returns_bad_request() {
        let err = WebhookError::MetadataMissing("user_id");
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn user_not_found_returns_bad_request() {
        let err = WebhookError::UserNotFound;
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn plan_not_found_returns_bad_request() {
        let err = WebhookError::PlanNotFound;
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn ignored_returns_ok() {
        // Ignored events must be acknowledged to prevent retries
        let err = WebhookError::Ignored("not relevant".to_string());
        assert_eq!(err.status_code(), StatusCode::OK);
    }

    #[test]
    fn config_missing_returns_internal_error() {
        let err = WebhookError::ConfigMissing;
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn subscription_not_found_returns_internal_error() {
        let err = WebhookError::SubscriptionNotFound;
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn ledger_error_returns_internal_error() {
        let err = WebhookError::from(LedgerError::Database("connection lost".to_string()));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn provider_error_returns_internal_error() {
        let err = WebhookError::from(ProviderError::Network("timeout".to_string()));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    // ══════════════════════════════════════════════════════════════
    // Session Error Tests
    // ══════════════════════════════════════════════════════════════

    #[test]
    fn session_plan_not_found_returns_not_found() {
        let err = SessionError::PlanNotFound;
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn session_no_customer_returns_bad_request() {
        let err = SessionError::NoCustomer;
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn session_provider_error_returns_bad_gateway() {
        let err = SessionError::from(ProviderError::Network("timeout".to_string()));
        assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);
        assert_eq!(format!("{}", err), "Provider error: network error: timeout");
    }
}
