//! CreatePortalSessionHandler - Command handler for opening the billing portal.
//!
//! The frontend only holds the checkout session id it got back from the
//! success redirect, so the portal flow resolves that session to its
//! provider customer first, then opens a portal session for the customer.

use std::sync::Arc;

use tracing::info;

use crate::domain::billing::SessionError;
use crate::ports::BillingProvider;

/// Command to open the billing portal for a completed checkout.
#[derive(Debug, Clone)]
pub struct CreatePortalSessionCommand {
    pub checkout_session_id: String,
}

/// Result carrying the portal redirect URL.
#[derive(Debug, Clone)]
pub struct CreatePortalSessionResult {
    pub portal_url: String,
}

/// Handler for opening a provider-hosted billing portal session.
pub struct CreatePortalSessionHandler {
    provider: Arc<dyn BillingProvider>,
    frontend_url: String,
}

impl CreatePortalSessionHandler {
    pub fn new(provider: Arc<dyn BillingProvider>, frontend_url: impl Into<String>) -> Self {
        Self {
            provider,
            frontend_url: frontend_url.into(),
        }
    }

    pub async fn handle(
        &self,
        cmd: CreatePortalSessionCommand,
    ) -> Result<CreatePortalSessionResult, SessionError> {
        let session = self
            .provider
            .retrieve_checkout_session(&cmd.checkout_session_id)
            .await?;

        // A session that never completed has no customer to open a portal
        // for.
        let customer = session.customer.ok_or(SessionError::NoCustomer)?;

        let portal = self
            .provider
            .create_portal_session(&customer, &self.frontend_url)
            .await?;

        info!(
            portal_session_id = %portal.id,
            checkout_session_id = %cmd.checkout_session_id,
            customer = %customer,
            "billing portal session created"
        );

        Ok(CreatePortalSessionResult {
            portal_url: portal.url,
        })
    }
}
