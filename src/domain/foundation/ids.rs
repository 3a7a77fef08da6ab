//! Typed ledger identifiers.
//!
//! Each row family gets its own UUID newtype so a payment id cannot be
//! handed to a subscription query by accident. Provider-issued ids
//! (`sub_...`, `pi_...`, `cus_...`) stay plain strings; these types cover
//! only rows this service mints.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

macro_rules! ledger_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(Uuid::parse_str(s)?))
            }
        }
    };
}

ledger_id! {
    /// Account whose billing state this service projects.
    UserId
}

ledger_id! {
    /// Subscription row in the ledger; distinct from the provider's
    /// `sub_...` identifier, which is stored alongside it.
    SubscriptionId
}

ledger_id! {
    /// Payment row in the ledger; the provider transaction id lives in its
    /// own uniquely-indexed column.
    PaymentId
}

ledger_id! {
    /// Catalog entry bridging a plan tier to the provider's `price_...` id.
    PlanId
}
