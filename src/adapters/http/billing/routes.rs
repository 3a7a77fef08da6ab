//! Axum router configuration for billing endpoints.
//!
//! This module defines the route structure for billing-related API endpoints
//! and wires them to their corresponding handlers.

use axum::{
    routing::{get, post},
    Router,
};

use super::handlers::{
    create_checkout, create_portal, handle_provider_webhook, health_check, BillingAppState,
};

/// Create the billing API router.
///
/// # Routes
///
/// ## User Endpoints (require authentication)
/// - `POST /checkout` - Start a hosted checkout flow
/// - `POST /portal` - Open the customer portal for a completed checkout
pub fn billing_routes() -> Router<BillingAppState> {
    Router::new()
        .route("/checkout", post(create_checkout))
        .route("/portal", post(create_portal))
}

/// Create the provider webhook router.
///
/// This is separate from the user-facing billing routes because webhooks
/// don't require user authentication (they're verified via signature).
///
/// # Routes
/// - `POST /stripe` - Verify and reconcile one provider delivery
pub fn webhook_routes() -> Router<BillingAppState> {
    Router::new().route("/stripe", post(handle_provider_webhook))
}

/// Create the complete billing module router.
///
/// Combines user routes, webhook routes, and the health probe into a single
/// router suitable for mounting at the API root.
pub fn billing_router() -> Router<BillingAppState> {
    Router::new()
        .nest("/billing", billing_routes())
        .nest("/webhooks", webhook_routes())
        .route("/health", get(health_check))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use crate::adapters::memory::{
        InMemoryLedgerStore, InMemoryPlanCatalog, InMemoryProcessedEventLog,
    };
    use crate::adapters::stripe::MockBillingProvider;

    fn test_state() -> BillingAppState {
        BillingAppState {
            ledger: Arc::new(InMemoryLedgerStore::new()),
            catalog: Arc::new(InMemoryPlanCatalog::new()),
            provider: Arc::new(MockBillingProvider::new()),
            event_log: Arc::new(InMemoryProcessedEventLog::new()),
            webhook_secret: None,
            frontend_url: "https://app.example.com".to_string(),
        }
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Router Tests
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn health_endpoint_responds_ok() {
        let app = billing_router().with_state(test_state());

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn webhook_route_rejects_unsigned_deliveries() {
        let app = billing_router().with_state(test_state());

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/webhooks/stripe")
                    .body(Body::from("{}"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn checkout_route_requires_authentication() {
        let app = billing_router().with_state(test_state());

        let body = r#"{"email":"viewer@example.com","plan_id":"e4b2d1a0-0000-0000-0000-000000000001"}"#;
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/billing/checkout")
                    .header("Content-Type", "application/json")
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
