//! Stripe billing provider adapter.
//!
//! Implements [`BillingProvider`] over Stripe's REST API: form-encoded
//! request bodies, basic auth on the secret key. Webhook signature
//! verification is deliberately not here; inbound events are authenticated
//! by the domain verifier before any code touches this adapter.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::error;

use crate::domain::billing::SubscriptionObject;
use crate::ports::{
    BillingProvider, CheckoutSession, CheckoutSessionRequest, PaymentIntent, PortalSession,
    ProviderError,
};

/// Stripe API configuration.
#[derive(Clone)]
pub struct StripeConfig {
    /// Stripe secret API key (sk_live_... or sk_test_...).
    api_key: SecretString,

    /// Base URL for the Stripe API.
    api_base_url: String,
}

impl StripeConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: SecretString::new(api_key.into()),
            api_base_url: "https://api.stripe.com".to_string(),
        }
    }

    /// Overrides the API base URL (for tests against a local server).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }
}

/// Stripe-backed implementation of [`BillingProvider`].
pub struct StripeBillingProvider {
    config: StripeConfig,
    http_client: reqwest::Client,
}

impl StripeBillingProvider {
    pub fn new(config: StripeConfig) -> Self {
        Self {
            config,
            http_client: reqwest::Client::new(),
        }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        operation: &'static str,
    ) -> Result<T, ProviderError> {
        let url = format!("{}{}", self.config.api_base_url, path);
        let response = self
            .http_client
            .get(&url)
            .basic_auth(self.config.api_key.expose_secret(), Option::<&str>::None)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        Self::into_json(response, operation).await
    }

    async fn post_form<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
        operation: &'static str,
    ) -> Result<T, ProviderError> {
        let url = format!("{}{}", self.config.api_base_url, path);
        let response = self
            .http_client
            .post(&url)
            .basic_auth(self.config.api_key.expose_secret(), Option::<&str>::None)
            .form(params)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        Self::into_json(response, operation).await
    }

    async fn into_json<T: DeserializeOwned>(
        response: reqwest::Response,
        operation: &'static str,
    ) -> Result<T, ProviderError> {
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            error!(operation, status, error = %message, "Stripe API call failed");
            return Err(ProviderError::Api { status, message });
        }

        response
            .json()
            .await
            .map_err(|e| ProviderError::Malformed(e.to_string()))
    }
}

/// Form parameters for a subscription-mode checkout session.
///
/// The correlation metadata embedded here is what the completed-checkout
/// webhook hands back, so both keys must survive the round trip unchanged.
fn checkout_params(request: &CheckoutSessionRequest) -> Vec<(&'static str, String)> {
    vec![
        ("mode", "subscription".to_string()),
        ("payment_method_types[0]", "card".to_string()),
        ("line_items[0][price]", request.price_id.clone()),
        ("line_items[0][quantity]", "1".to_string()),
        ("customer_email", request.customer_email.clone()),
        ("metadata[user_id]", request.user_id.to_string()),
        ("metadata[plan_id]", request.plan_id.to_string()),
        ("billing_address_collection", "required".to_string()),
        ("success_url", request.success_url.clone()),
        ("cancel_url", request.cancel_url.clone()),
    ]
}

// ════════════════════════════════════════════════════════════════════════════
// Response Shapes
// ════════════════════════════════════════════════════════════════════════════

#[derive(Deserialize)]
struct CheckoutSessionResponse {
    id: String,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    customer: Option<String>,
    #[serde(default)]
    subscription: Option<String>,
}

impl From<CheckoutSessionResponse> for CheckoutSession {
    fn from(response: CheckoutSessionResponse) -> Self {
        CheckoutSession {
            id: response.id,
            url: response.url,
            customer: response.customer,
            subscription: response.subscription,
        }
    }
}

#[derive(Deserialize)]
struct PortalSessionResponse {
    id: String,
    url: String,
}

#[derive(Deserialize)]
struct PaymentIntentResponse {
    id: String,
    status: String,
    #[serde(default)]
    last_payment_error: Option<LastPaymentError>,
}

#[derive(Deserialize)]
struct LastPaymentError {
    #[serde(default)]
    message: Option<String>,
}

// ════════════════════════════════════════════════════════════════════════════
// BillingProvider Implementation
// ════════════════════════════════════════════════════════════════════════════

#[async_trait]
impl BillingProvider for StripeBillingProvider {
    async fn create_checkout_session(
        &self,
        request: CheckoutSessionRequest,
    ) -> Result<CheckoutSession, ProviderError> {
        let params = checkout_params(&request);
        let response: CheckoutSessionResponse = self
            .post_form("/v1/checkout/sessions", &params, "create_checkout_session")
            .await?;

        Ok(response.into())
    }

    async fn retrieve_checkout_session(
        &self,
        session_id: &str,
    ) -> Result<CheckoutSession, ProviderError> {
        let response: CheckoutSessionResponse = self
            .get_json(
                &format!("/v1/checkout/sessions/{}", session_id),
                "retrieve_checkout_session",
            )
            .await?;

        Ok(response.into())
    }

    async fn create_portal_session(
        &self,
        customer_id: &str,
        return_url: &str,
    ) -> Result<PortalSession, ProviderError> {
        let params = [
            ("customer", customer_id.to_string()),
            ("return_url", return_url.to_string()),
        ];
        let response: PortalSessionResponse = self
            .post_form(
                "/v1/billing_portal/sessions",
                &params,
                "create_portal_session",
            )
            .await?;

        Ok(PortalSession {
            id: response.id,
            url: response.url,
        })
    }

    async fn get_subscription(
        &self,
        provider_subscription_id: &str,
    ) -> Result<SubscriptionObject, ProviderError> {
        self.get_json(
            &format!("/v1/subscriptions/{}", provider_subscription_id),
            "get_subscription",
        )
        .await
    }

    async fn get_payment_intent(
        &self,
        payment_intent_id: &str,
    ) -> Result<PaymentIntent, ProviderError> {
        let response: PaymentIntentResponse = self
            .get_json(
                &format!("/v1/payment_intents/{}", payment_intent_id),
                "get_payment_intent",
            )
            .await?;

        Ok(PaymentIntent {
            id: response.id,
            status: response.status,
            failure_message: response.last_payment_error.and_then(|e| e.message),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::{PlanId, UserId};

    fn test_request() -> CheckoutSessionRequest {
        CheckoutSessionRequest {
            customer_email: "viewer@example.com".to_string(),
            price_id: "price_standard_monthly".to_string(),
            user_id: UserId::new(),
            plan_id: PlanId::new(),
            success_url: "https://app.example.com/?success=true".to_string(),
            cancel_url: "https://app.example.com?canceled=true".to_string(),
        }
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Configuration Tests
    // ════════════════════════════════════════════════════════════════════════════

    #[test]
    fn config_defaults_to_stripe_api() {
        let config = StripeConfig::new("sk_test_key");
        assert_eq!(config.api_base_url, "https://api.stripe.com");
    }

    #[test]
    fn config_with_base_url_overrides_default() {
        let config = StripeConfig::new("sk_test_key").with_base_url("http://localhost:12111");
        assert_eq!(config.api_base_url, "http://localhost:12111");
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Checkout Params Tests
    // ════════════════════════════════════════════════════════════════════════════

    #[test]
    fn checkout_params_request_subscription_mode_card_payment() {
        let params = checkout_params(&test_request());

        assert!(params.contains(&("mode", "subscription".to_string())));
        assert!(params.contains(&("payment_method_types[0]", "card".to_string())));
        assert!(params.contains(&("billing_address_collection", "required".to_string())));
    }

    #[test]
    fn checkout_params_carry_correlation_metadata() {
        let request = test_request();
        let params = checkout_params(&request);

        assert!(params.contains(&("metadata[user_id]", request.user_id.to_string())));
        assert!(params.contains(&("metadata[plan_id]", request.plan_id.to_string())));
    }

    #[test]
    fn checkout_params_use_the_plan_price() {
        let params = checkout_params(&test_request());

        assert!(params.contains(&("line_items[0][price]", "price_standard_monthly".to_string())));
        assert!(params.contains(&("line_items[0][quantity]", "1".to_string())));
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Response Shape Tests
    // ════════════════════════════════════════════════════════════════════════════

    #[test]
    fn checkout_session_response_tolerates_missing_optionals() {
        let response: CheckoutSessionResponse =
            serde_json::from_str(r#"{"id": "cs_123"}"#).unwrap();
        let session: CheckoutSession = response.into();

        assert_eq!(session.id, "cs_123");
        assert_eq!(session.url, None);
        assert_eq!(session.customer, None);
        assert_eq!(session.subscription, None);
    }

    #[test]
    fn payment_intent_response_extracts_decline_message() {
        let json = r#"{
            "id": "pi_123",
            "status": "requires_payment_method",
            "last_payment_error": {"message": "Your card was declined."}
        }"#;
        let response: PaymentIntentResponse = serde_json::from_str(json).unwrap();

        assert_eq!(
            response.last_payment_error.and_then(|e| e.message).as_deref(),
            Some("Your card was declined.")
        );
    }
}
