//! In-memory plan catalog.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::billing::Plan;
use crate::domain::foundation::PlanId;
use crate::ports::{LedgerError, PlanCatalog};

/// In-memory implementation of [`PlanCatalog`] for tests and local runs.
pub struct InMemoryPlanCatalog {
    plans: Mutex<HashMap<PlanId, Plan>>,
}

impl InMemoryPlanCatalog {
    /// Creates an empty catalog.
    pub fn new() -> Self {
        Self {
            plans: Mutex::new(HashMap::new()),
        }
    }

    /// Creates a catalog seeded with the given plans.
    pub fn with_plans(plans: Vec<Plan>) -> Self {
        let map = plans.into_iter().map(|p| (p.id, p)).collect();
        Self {
            plans: Mutex::new(map),
        }
    }

    /// Adds a plan to the catalog.
    pub async fn insert_plan(&self, plan: Plan) {
        self.plans.lock().await.insert(plan.id, plan);
    }
}

impl Default for InMemoryPlanCatalog {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PlanCatalog for InMemoryPlanCatalog {
    async fn find_by_id(&self, plan_id: PlanId) -> Result<Option<Plan>, LedgerError> {
        Ok(self.plans.lock().await.get(&plan_id).cloned())
    }

    async fn find_by_provider_price_id(
        &self,
        provider_price_id: &str,
    ) -> Result<Option<Plan>, LedgerError> {
        Ok(self
            .plans
            .lock()
            .await
            .values()
            .find(|p| p.provider_price_id == provider_price_id)
            .cloned())
    }
}
