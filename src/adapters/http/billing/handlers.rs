//! HTTP handlers for billing endpoints.
//!
//! These handlers connect Axum routes to application layer command handlers.

use std::sync::Arc;

use axum::extract::{Json, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use secrecy::SecretString;
use uuid::Uuid;

use crate::application::handlers::billing::{
    CreateCheckoutSessionCommand, CreateCheckoutSessionHandler, CreatePortalSessionCommand,
    CreatePortalSessionHandler,
};
use crate::application::handlers::reconciliation::reconciliation_handlers;
use crate::application::process_webhook::{ProcessWebhookCommand, ProcessWebhookHandler};
use crate::application::router::EventRouter;
use crate::domain::billing::{EventVerifier, SessionError, WebhookError};
use crate::domain::foundation::UserId;
use crate::ports::{BillingProvider, LedgerStore, PlanCatalog, ProcessedEventLog};

use super::dto::{
    CheckoutResponse, CreateCheckoutRequest, CreatePortalRequest, ErrorResponse, HealthResponse,
    PortalResponse, WebhookAckResponse,
};

// ════════════════════════════════════════════════════════════════════════════════
// Application State
// ════════════════════════════════════════════════════════════════════════════════

/// Shared application state containing all dependencies.
///
/// This struct is cloned for each request and contains Arc-wrapped dependencies
/// for efficient sharing across handlers.
#[derive(Clone)]
pub struct BillingAppState {
    pub ledger: Arc<dyn LedgerStore>,
    pub catalog: Arc<dyn PlanCatalog>,
    pub provider: Arc<dyn BillingProvider>,
    pub event_log: Arc<dyn ProcessedEventLog>,
    /// Webhook signing secret; `None` keeps the server up with webhook
    /// deliveries rejected until the secret is configured.
    pub webhook_secret: Option<SecretString>,
    /// Base URL the checkout and portal flows redirect back to.
    pub frontend_url: String,
}

impl BillingAppState {
    /// Create handlers on demand from the shared state.
    pub fn process_webhook_handler(&self) -> ProcessWebhookHandler {
        let handlers = reconciliation_handlers(
            self.ledger.clone(),
            self.catalog.clone(),
            self.provider.clone(),
        );
        ProcessWebhookHandler::new(
            EventVerifier::new(self.webhook_secret.clone()),
            EventRouter::new(handlers),
            self.event_log.clone(),
        )
    }

    pub fn checkout_handler(&self) -> CreateCheckoutSessionHandler {
        CreateCheckoutSessionHandler::new(
            self.catalog.clone(),
            self.provider.clone(),
            self.frontend_url.clone(),
        )
    }

    pub fn portal_handler(&self) -> CreatePortalSessionHandler {
        CreatePortalSessionHandler::new(self.provider.clone(), self.frontend_url.clone())
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// User Context (would come from auth middleware in production)
// ════════════════════════════════════════════════════════════════════════════════

/// Authenticated user context extracted from request.
///
/// In production, this would be extracted from JWT/session by auth middleware.
/// For now, uses a header-based extraction for development/testing.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: UserId,
}

/// Rejection type for AuthenticatedUser extraction.
pub struct AuthenticationRequired;

impl IntoResponse for AuthenticationRequired {
    fn into_response(self) -> axum::response::Response {
        let error = ErrorResponse::new("AUTHENTICATION_REQUIRED", "Authentication is required");
        (StatusCode::UNAUTHORIZED, Json(error)).into_response()
    }
}

impl<S> axum::extract::FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = AuthenticationRequired;

    fn from_request_parts<'life0, 'life1, 'async_trait>(
        parts: &'life0 mut axum::http::request::Parts,
        _state: &'life1 S,
    ) -> std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self, Self::Rejection>> + Send + 'async_trait>,
    >
    where
        'life0: 'async_trait,
        'life1: 'async_trait,
        Self: 'async_trait,
    {
        Box::pin(async move {
            // In production, this would validate JWT token from Authorization header
            // For development, we accept an X-User-Id header
            let user_id = parts
                .headers
                .get("X-User-Id")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| Uuid::parse_str(s).ok())
                .map(UserId::from_uuid)
                .ok_or(AuthenticationRequired)?;

            Ok(AuthenticatedUser { user_id })
        })
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Handlers
// ════════════════════════════════════════════════════════════════════════════════

/// POST /webhooks/stripe - Verify and reconcile one provider delivery
///
/// Answers 2xx for applied, ignored, and already-settled events alike; any
/// non-2xx tells the provider to redeliver.
pub async fn handle_provider_webhook(
    State(state): State<BillingAppState>,
    headers: axum::http::HeaderMap,
    body: axum::body::Bytes,
) -> Result<impl IntoResponse, BillingApiError> {
    // A missing signature header fails the same way a wrong one does.
    let signature = headers
        .get("Stripe-Signature")
        .and_then(|v| v.to_str().ok())
        .ok_or(WebhookError::SignatureInvalid)?;

    let handler = state.process_webhook_handler();
    let cmd = ProcessWebhookCommand {
        payload: body.to_vec(),
        signature: signature.to_string(),
    };

    handler.handle(cmd).await?;

    Ok(Json(WebhookAckResponse { received: true }))
}

/// POST /billing/checkout - Start a hosted checkout flow
pub async fn create_checkout(
    State(state): State<BillingAppState>,
    user: AuthenticatedUser,
    Json(request): Json<CreateCheckoutRequest>,
) -> Result<impl IntoResponse, BillingApiError> {
    let handler = state.checkout_handler();
    let cmd = CreateCheckoutSessionCommand {
        user_id: user.user_id,
        email: request.email,
        plan_id: request.plan_id,
    };

    let result = handler.handle(cmd).await?;

    Ok((StatusCode::CREATED, Json(CheckoutResponse::from(result))))
}

/// POST /billing/portal - Open the customer portal for a completed checkout
pub async fn create_portal(
    State(state): State<BillingAppState>,
    _user: AuthenticatedUser,
    Json(request): Json<CreatePortalRequest>,
) -> Result<impl IntoResponse, BillingApiError> {
    let handler = state.portal_handler();
    let cmd = CreatePortalSessionCommand {
        checkout_session_id: request.session_id,
    };

    let result = handler.handle(cmd).await?;

    Ok((StatusCode::CREATED, Json(PortalResponse::from(result))))
}

/// GET /health - Liveness probe
pub async fn health_check() -> impl IntoResponse {
    Json(HealthResponse { status: "ok" })
}

// ════════════════════════════════════════════════════════════════════════════════
// Error Handling
// ════════════════════════════════════════════════════════════════════════════════

/// API error type that converts domain errors to HTTP responses.
///
/// Webhook errors carry retry semantics in their status codes: 5xx asks the
/// provider to redeliver, 4xx and 2xx settle the delivery.
pub enum BillingApiError {
    Webhook(WebhookError),
    Session(SessionError),
}

impl From<WebhookError> for BillingApiError {
    fn from(err: WebhookError) -> Self {
        Self::Webhook(err)
    }
}

impl From<SessionError> for BillingApiError {
    fn from(err: SessionError) -> Self {
        Self::Session(err)
    }
}

impl IntoResponse for BillingApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, error_code, message) = match &self {
            BillingApiError::Webhook(err) => {
                let error_code = match err {
                    WebhookError::SignatureInvalid => "INVALID_WEBHOOK_SIGNATURE",
                    WebhookError::PayloadMalformed(_) => "MALFORMED_PAYLOAD",
                    WebhookError::ConfigMissing => "WEBHOOK_NOT_CONFIGURED",
                    WebhookError::MetadataMissing(_) => "METADATA_MISSING",
                    WebhookError::UserNotFound => "USER_NOT_FOUND",
                    WebhookError::SubscriptionNotFound => "SUBSCRIPTION_NOT_FOUND",
                    WebhookError::PlanNotFound => "PLAN_NOT_FOUND",
                    WebhookError::Ignored(_) => "EVENT_IGNORED",
                    WebhookError::Provider(_) => "PROVIDER_ERROR",
                    WebhookError::Ledger(_) => "STORAGE_ERROR",
                };
                (err.status_code(), error_code, err.to_string())
            }
            BillingApiError::Session(err) => {
                let error_code = match err {
                    SessionError::PlanNotFound => "PLAN_NOT_FOUND",
                    SessionError::NoCustomer => "NO_CUSTOMER_FOR_SESSION",
                    SessionError::NoRedirectUrl => "NO_REDIRECT_URL",
                    SessionError::Provider(_) => "PROVIDER_ERROR",
                    SessionError::Ledger(_) => "STORAGE_ERROR",
                };
                (err.status_code(), error_code, err.to_string())
            }
        };

        let body = ErrorResponse::new(error_code, message);
        (status, Json(body)).into_response()
    }
}
