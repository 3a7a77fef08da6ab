//! HTTP DTOs (Data Transfer Objects) for billing endpoints.
//!
//! These types define the JSON request/response structure for the billing API.
//! They serve as the boundary between HTTP and the application layer.

use serde::{Deserialize, Serialize};

use crate::application::handlers::billing::{CreateCheckoutSessionResult, CreatePortalSessionResult};
use crate::domain::foundation::PlanId;

// ════════════════════════════════════════════════════════════════════════════════
// Request DTOs
// ════════════════════════════════════════════════════════════════════════════════

/// Request to start a hosted checkout flow.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateCheckoutRequest {
    /// Email to attach to the provider customer.
    pub email: String,
    /// Catalog plan to subscribe to.
    pub plan_id: PlanId,
}

/// Request to open the customer portal after a completed checkout.
#[derive(Debug, Clone, Deserialize)]
pub struct CreatePortalRequest {
    /// The checkout session id handed back on the success redirect.
    pub session_id: String,
}

// ════════════════════════════════════════════════════════════════════════════════
// Response DTOs
// ════════════════════════════════════════════════════════════════════════════════

/// Response for checkout initiation.
#[derive(Debug, Clone, Serialize)]
pub struct CheckoutResponse {
    /// Provider checkout session id.
    pub session_id: String,
    /// Hosted checkout URL to redirect the browser to.
    pub checkout_url: String,
}

impl From<CreateCheckoutSessionResult> for CheckoutResponse {
    fn from(result: CreateCheckoutSessionResult) -> Self {
        Self {
            session_id: result.session_id,
            checkout_url: result.checkout_url,
        }
    }
}

/// Response for customer portal creation.
#[derive(Debug, Clone, Serialize)]
pub struct PortalResponse {
    /// Hosted portal URL to redirect the browser to.
    pub portal_url: String,
}

impl From<CreatePortalSessionResult> for PortalResponse {
    fn from(result: CreatePortalSessionResult) -> Self {
        Self {
            portal_url: result.portal_url,
        }
    }
}

/// Acknowledgement body for webhook deliveries.
///
/// The provider only inspects the status code; the body exists for humans
/// reading delivery logs.
#[derive(Debug, Clone, Serialize)]
pub struct WebhookAckResponse {
    pub received: bool,
}

/// Response for the health endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

// ════════════════════════════════════════════════════════════════════════════════
// Error Response DTO
// ════════════════════════════════════════════════════════════════════════════════

/// Standard error response for API errors.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling.
    pub error_code: String,
    /// Human-readable error message.
    pub message: String,
}

impl ErrorResponse {
    /// Create a new error response.
    pub fn new(error_code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error_code: error_code.into(),
            message: message.into(),
        }
    }
}
