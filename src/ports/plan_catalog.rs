//! PlanCatalog port - Interface for the plan catalog.
//!
//! Plans map our internal plan ids to the provider's price ids. The catalog
//! is read-only from this engine's point of view; plan management happens
//! elsewhere.

use async_trait::async_trait;

use super::ledger_store::LedgerError;
use crate::domain::billing::Plan;
use crate::domain::foundation::PlanId;

/// Port for looking up catalog plans.
#[async_trait]
pub trait PlanCatalog: Send + Sync {
    /// Finds a plan by internal id. Used when validating checkout requests.
    async fn find_by_id(&self, plan_id: PlanId) -> Result<Option<Plan>, LedgerError>;

    /// Finds a plan by the provider's price id. Used when a subscription
    /// event reports a price we need to resolve back to a plan.
    async fn find_by_provider_price_id(
        &self,
        provider_price_id: &str,
    ) -> Result<Option<Plan>, LedgerError>;
}
