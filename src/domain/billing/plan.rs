//! Subscription plan catalog entries.
//!
//! The catalog is read-only to this engine: plans are provisioned elsewhere,
//! and reconciliation only resolves them by provider price id when the
//! provider reports a plan change.

use crate::domain::foundation::{Money, PlanId};
use serde::{Deserialize, Serialize};

/// Streaming plan tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanTier {
    /// Single mobile device, SD quality.
    Mobile,

    /// One screen, HD quality.
    Basic,

    /// Two screens, Full HD quality.
    Standard,

    /// Four screens, 4K + HDR quality.
    Premium,
}

impl PlanTier {
    /// Parses a stored tier string.
    pub fn from_stored(s: &str) -> Option<Self> {
        match s {
            "mobile" => Some(PlanTier::Mobile),
            "basic" => Some(PlanTier::Basic),
            "standard" => Some(PlanTier::Standard),
            "premium" => Some(PlanTier::Premium),
            _ => None,
        }
    }

    /// Returns the storage string for this tier.
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanTier::Mobile => "mobile",
            PlanTier::Basic => "basic",
            PlanTier::Standard => "standard",
            PlanTier::Premium => "premium",
        }
    }
}

impl std::fmt::Display for PlanTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One catalog plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    /// Unique catalog identifier.
    pub id: PlanId,

    /// Tier name.
    pub tier: PlanTier,

    /// Provider price id this plan bills through; the correlation key used
    /// when the provider reports a plan change on a subscription.
    pub provider_price_id: String,

    /// Monthly price in major units.
    pub monthly_price: Money,
}

impl Plan {
    /// Creates a catalog entry.
    pub fn new(id: PlanId, tier: PlanTier, provider_price_id: String, monthly_price: Money) -> Self {
        Self {
            id,
            tier,
            provider_price_id,
            monthly_price,
        }
    }
}
