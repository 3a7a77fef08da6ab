//! Mock billing provider for testing.
//!
//! Provides a configurable mock implementation of `BillingProvider` for unit
//! and integration tests. Supports:
//! - Pre-configured sessions, subscriptions, and payment intents
//! - Error injection (global or per method)
//! - Call tracking

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::domain::billing::SubscriptionObject;
use crate::ports::{
    BillingProvider, CheckoutSession, CheckoutSessionRequest, PaymentIntent, PortalSession,
    ProviderError,
};

/// Mock billing provider for testing.
///
/// Cloning shares the underlying state, so a test can keep a handle for
/// assertions after moving a clone into the code under test.
#[derive(Default)]
pub struct MockBillingProvider {
    inner: Arc<Mutex<MockState>>,
}

/// Internal mutable state.
#[derive(Default)]
struct MockState {
    /// Checkout sessions by id.
    checkout_sessions: HashMap<String, CheckoutSession>,

    /// Subscriptions by provider subscription id.
    subscriptions: HashMap<String, SubscriptionObject>,

    /// Payment intents by id.
    payment_intents: HashMap<String, PaymentIntent>,

    /// Next checkout session to return from `create_checkout_session`.
    next_checkout: Option<CheckoutSession>,

    /// Next portal session to return.
    next_portal: Option<PortalSession>,

    /// Error to return on the next call to any method.
    next_error: Option<ProviderError>,

    /// Specific errors by method name.
    method_errors: HashMap<String, ProviderError>,

    /// Recorded method calls for assertions.
    call_log: Vec<MethodCall>,
}

/// Recorded method call for assertions.
#[derive(Debug, Clone)]
pub struct MethodCall {
    pub method: String,
    pub args: Vec<String>,
}

impl MockBillingProvider {
    /// Creates a new mock provider with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a mock that already knows the given subscription.
    pub fn with_subscription(subscription: SubscriptionObject) -> Self {
        let mock = Self::new();
        mock.add_subscription(subscription);
        mock
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Configuration Methods
    // ════════════════════════════════════════════════════════════════════════════

    /// Adds a checkout session retrievable by id.
    pub fn add_checkout_session(&self, session: CheckoutSession) {
        let id = session.id.clone();
        self.lock().checkout_sessions.insert(id, session);
    }

    /// Adds a subscription retrievable by provider subscription id.
    pub fn add_subscription(&self, subscription: SubscriptionObject) {
        let id = subscription.id.clone();
        self.lock().subscriptions.insert(id, subscription);
    }

    /// Adds a payment intent retrievable by id.
    pub fn add_payment_intent(&self, intent: PaymentIntent) {
        let id = intent.id.clone();
        self.lock().payment_intents.insert(id, intent);
    }

    /// Sets the session returned by the next `create_checkout_session` call.
    pub fn set_checkout_session(&self, session: CheckoutSession) {
        self.lock().next_checkout = Some(session);
    }

    /// Sets the session returned by the next `create_portal_session` call.
    pub fn set_portal_session(&self, session: PortalSession) {
        self.lock().next_portal = Some(session);
    }

    /// Sets an error to return on the next call to any method.
    pub fn set_error(&self, error: ProviderError) {
        self.lock().next_error = Some(error);
    }

    /// Sets an error for a specific method.
    pub fn set_method_error(&self, method: &str, error: ProviderError) {
        self.lock().method_errors.insert(method.to_string(), error);
    }

    /// Clears all configured errors.
    pub fn clear_errors(&self) {
        let mut state = self.lock();
        state.next_error = None;
        state.method_errors.clear();
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Call Tracking
    // ════════════════════════════════════════════════════════════════════════════

    /// Returns all recorded method calls.
    pub fn calls(&self) -> Vec<MethodCall> {
        self.lock().call_log.clone()
    }

    /// Returns true if a method was called at least once.
    pub fn was_called(&self, method: &str) -> bool {
        self.lock().call_log.iter().any(|c| c.method == method)
    }

    /// Returns the number of calls to a method.
    pub fn call_count(&self, method: &str) -> usize {
        self.lock()
            .call_log
            .iter()
            .filter(|c| c.method == method)
            .count()
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Internal Helpers
    // ════════════════════════════════════════════════════════════════════════════

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.inner.lock().expect("MockBillingProvider lock poisoned")
    }

    fn record_call(&self, method: &str, args: Vec<String>) {
        self.lock().call_log.push(MethodCall {
            method: method.to_string(),
            args,
        });
    }

    fn check_error(&self, method: &str) -> Result<(), ProviderError> {
        let mut state = self.lock();
        if let Some(error) = state.method_errors.get(method) {
            return Err(error.clone());
        }
        if let Some(error) = state.next_error.take() {
            return Err(error);
        }
        Ok(())
    }

    fn short_id() -> String {
        uuid::Uuid::new_v4()
            .to_string()
            .split('-')
            .next()
            .unwrap_or("0")
            .to_string()
    }
}

impl Clone for MockBillingProvider {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

#[async_trait]
impl BillingProvider for MockBillingProvider {
    async fn create_checkout_session(
        &self,
        request: CheckoutSessionRequest,
    ) -> Result<CheckoutSession, ProviderError> {
        self.record_call(
            "create_checkout_session",
            vec![
                request.customer_email.clone(),
                request.price_id.clone(),
                request.user_id.to_string(),
                request.plan_id.to_string(),
                request.success_url.clone(),
                request.cancel_url.clone(),
            ],
        );
        self.check_error("create_checkout_session")?;

        let mut state = self.lock();
        let session = state.next_checkout.take().unwrap_or_else(|| {
            let id = format!("cs_mock_{}", Self::short_id());
            CheckoutSession {
                url: Some(format!("https://checkout.example.com/c/{}", id)),
                id,
                customer: None,
                subscription: None,
            }
        });
        state
            .checkout_sessions
            .insert(session.id.clone(), session.clone());

        Ok(session)
    }

    async fn retrieve_checkout_session(
        &self,
        session_id: &str,
    ) -> Result<CheckoutSession, ProviderError> {
        self.record_call("retrieve_checkout_session", vec![session_id.to_string()]);
        self.check_error("retrieve_checkout_session")?;

        let state = self.lock();
        state
            .checkout_sessions
            .get(session_id)
            .cloned()
            .ok_or_else(|| ProviderError::Api {
                status: 404,
                message: format!("No such checkout session: {}", session_id),
            })
    }

    async fn create_portal_session(
        &self,
        customer_id: &str,
        return_url: &str,
    ) -> Result<PortalSession, ProviderError> {
        self.record_call(
            "create_portal_session",
            vec![customer_id.to_string(), return_url.to_string()],
        );
        self.check_error("create_portal_session")?;

        let mut state = self.lock();
        let session = state.next_portal.take().unwrap_or_else(|| {
            let id = format!("bps_mock_{}", Self::short_id());
            PortalSession {
                url: format!("https://billing.example.com/p/{}", id),
                id,
            }
        });

        Ok(session)
    }

    async fn get_subscription(
        &self,
        provider_subscription_id: &str,
    ) -> Result<SubscriptionObject, ProviderError> {
        self.record_call(
            "get_subscription",
            vec![provider_subscription_id.to_string()],
        );
        self.check_error("get_subscription")?;

        let state = self.lock();
        state
            .subscriptions
            .get(provider_subscription_id)
            .cloned()
            .ok_or_else(|| ProviderError::Api {
                status: 404,
                message: format!("No such subscription: {}", provider_subscription_id),
            })
    }

    async fn get_payment_intent(
        &self,
        payment_intent_id: &str,
    ) -> Result<PaymentIntent, ProviderError> {
        self.record_call("get_payment_intent", vec![payment_intent_id.to_string()]);
        self.check_error("get_payment_intent")?;

        let state = self.lock();
        state
            .payment_intents
            .get(payment_intent_id)
            .cloned()
            .ok_or_else(|| ProviderError::Api {
                status: 404,
                message: format!("No such payment intent: {}", payment_intent_id),
            })
    }
}
