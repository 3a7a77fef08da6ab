//! PostgreSQL-backed plan catalog.

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::billing::{Plan, PlanTier};
use crate::domain::foundation::{Money, PlanId};
use crate::ports::{LedgerError, PlanCatalog};

/// PostgreSQL implementation of the [`PlanCatalog`] port.
pub struct PostgresPlanCatalog {
    pool: PgPool,
}

impl PostgresPlanCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PlanRow {
    id: Uuid,
    tier: String,
    provider_price_id: String,
    monthly_price: Decimal,
    currency: String,
}

impl TryFrom<PlanRow> for Plan {
    type Error = LedgerError;

    fn try_from(row: PlanRow) -> Result<Self, Self::Error> {
        let tier = PlanTier::from_stored(&row.tier)
            .ok_or_else(|| LedgerError::Database(format!("invalid plan tier: {}", row.tier)))?;

        Ok(Plan {
            id: PlanId::from_uuid(row.id),
            tier,
            provider_price_id: row.provider_price_id,
            monthly_price: Money::new(row.monthly_price, &row.currency),
        })
    }
}

const PLAN_COLUMNS: &str = "id, tier, provider_price_id, monthly_price, currency";

#[async_trait]
impl PlanCatalog for PostgresPlanCatalog {
    async fn find_by_id(&self, plan_id: PlanId) -> Result<Option<Plan>, LedgerError> {
        let row: Option<PlanRow> =
            sqlx::query_as(&format!("SELECT {} FROM plans WHERE id = $1", PLAN_COLUMNS))
                .bind(plan_id.as_uuid())
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| LedgerError::Database(e.to_string()))?;

        row.map(Plan::try_from).transpose()
    }

    async fn find_by_provider_price_id(
        &self,
        provider_price_id: &str,
    ) -> Result<Option<Plan>, LedgerError> {
        let row: Option<PlanRow> = sqlx::query_as(&format!(
            "SELECT {} FROM plans WHERE provider_price_id = $1",
            PLAN_COLUMNS
        ))
        .bind(provider_price_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| LedgerError::Database(e.to_string()))?;

        row.map(Plan::try_from).transpose()
    }
}
