//! CreateCheckoutSessionHandler - Command handler for starting a checkout.
//!
//! Validates the requested plan against the catalog, then asks the provider
//! for a hosted checkout session carrying `{user_id, plan_id}` correlation
//! metadata. That metadata is how the eventual `checkout.session.completed`
//! webhook finds its way back to the right user.

use std::sync::Arc;

use tracing::info;

use crate::domain::billing::SessionError;
use crate::domain::foundation::{PlanId, UserId};
use crate::ports::{BillingProvider, CheckoutSessionRequest, PlanCatalog};

/// Command to start a hosted checkout for a plan.
#[derive(Debug, Clone)]
pub struct CreateCheckoutSessionCommand {
    pub user_id: UserId,
    pub email: String,
    pub plan_id: PlanId,
}

/// Result of a successfully created checkout session.
#[derive(Debug, Clone)]
pub struct CreateCheckoutSessionResult {
    pub session_id: String,
    pub checkout_url: String,
}

/// Handler for starting the checkout flow.
///
/// The subscription itself is not created here; it materializes when the
/// provider's webhook confirms the completed checkout.
pub struct CreateCheckoutSessionHandler {
    catalog: Arc<dyn PlanCatalog>,
    provider: Arc<dyn BillingProvider>,
    frontend_url: String,
}

impl CreateCheckoutSessionHandler {
    pub fn new(
        catalog: Arc<dyn PlanCatalog>,
        provider: Arc<dyn BillingProvider>,
        frontend_url: impl Into<String>,
    ) -> Self {
        Self {
            catalog,
            provider,
            frontend_url: frontend_url.into(),
        }
    }

    pub async fn handle(
        &self,
        cmd: CreateCheckoutSessionCommand,
    ) -> Result<CreateCheckoutSessionResult, SessionError> {
        let plan = self
            .catalog
            .find_by_id(cmd.plan_id)
            .await?
            .ok_or(SessionError::PlanNotFound)?;

        // {CHECKOUT_SESSION_ID} is a provider-side template the hosted page
        // substitutes on redirect; it reaches the provider verbatim.
        let session = self
            .provider
            .create_checkout_session(CheckoutSessionRequest {
                customer_email: cmd.email,
                price_id: plan.provider_price_id.clone(),
                user_id: cmd.user_id,
                plan_id: cmd.plan_id,
                success_url: format!(
                    "{}/?success=true&session_id={{CHECKOUT_SESSION_ID}}",
                    self.frontend_url
                ),
                cancel_url: format!("{}?canceled=true", self.frontend_url),
            })
            .await?;

        let checkout_url = session.url.ok_or(SessionError::NoRedirectUrl)?;

        info!(
            session_id = %session.id,
            user_id = %cmd.user_id,
            plan_id = %cmd.plan_id,
            tier = %plan.tier,
            "checkout session created"
        );

        Ok(CreateCheckoutSessionResult {
            session_id: session.id,
            checkout_url,
        })
    }
}
