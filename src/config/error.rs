//! Configuration error types.
//!
//! `ConfigError` covers the load path (env parsing and deserialization);
//! `ValidationError` covers semantic checks run after a successful load.

use thiserror::Error;

/// Errors raised while loading configuration from the environment.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read configuration from environment: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Configuration rejected: {0}")]
    Invalid(#[from] ValidationError),
}

/// Semantic validation failures for loaded configuration values.
///
/// Each variant names the specific constraint so startup logs point straight
/// at the offending variable.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Required setting {field} was not provided")]
    Missing { field: &'static str },

    #[error("Server port must be non-zero")]
    PortZero,

    #[error("Request timeout must be 1-300 seconds, got {0}")]
    TimeoutOutOfRange(u64),

    #[error("Database URL must use a postgres:// or postgresql:// scheme")]
    DatabaseUrlScheme,

    #[error("Connection pool bounds invalid: {0}")]
    PoolBounds(String),

    #[error("Stripe API key must start with sk_test_ or sk_live_")]
    StripeKeyPrefix,

    #[error("Webhook signing secret must start with whsec_")]
    WebhookSecretPrefix,

    #[error("Frontend URL must be absolute http(s)")]
    FrontendUrlScheme,
}
