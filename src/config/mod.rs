//! Typed configuration for the billing engine.
//!
//! Settings load from the environment (plus a `.env` file in development)
//! via the `config` and `dotenvy` crates. Variables carry the `STREAMBILL`
//! prefix with `__` separating nesting levels, so
//! `STREAMBILL__DATABASE__URL` lands in `database.url`.
//!
//! # Example
//!
//! ```no_run
//! use streambill::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//!
//! println!("Listening on {}", config.server.socket_addr());
//! ```

mod database;
mod error;
mod payment;
mod server;

pub use database::DatabaseConfig;
pub use error::{ConfigError, ValidationError};
pub use payment::PaymentConfig;
pub use server::{Environment, ServerConfig};

use serde::Deserialize;

/// Root configuration assembled from all sections.
///
/// `server` falls back to defaults when unset; `database` and `payment`
/// carry required values and fail the load when absent.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,

    pub database: DatabaseConfig,

    pub payment: PaymentConfig,
}

impl AppConfig {
    /// Read configuration from the environment.
    ///
    /// Loads `.env` first when present, then deserializes every
    /// `STREAMBILL__`-prefixed variable into the typed sections. Parse and
    /// missing-section failures surface as [`ConfigError`]; call
    /// [`AppConfig::validate`] afterwards for the semantic checks.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix("STREAMBILL")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Run the per-section semantic checks (URL schemes, pool bounds,
    /// credential prefixes).
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.server.validate()?;
        self.database.validate()?;
        self.payment.validate()?;
        Ok(())
    }

    pub fn is_production(&self) -> bool {
        self.server.is_production()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

    // Env vars are process-global; serialize the tests that touch them.
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    fn set_minimal_env() {
        env::set_var(
            "STREAMBILL__DATABASE__URL",
            "postgresql://billing@localhost/streambill",
        );
        env::set_var(
            "STREAMBILL__PAYMENT__STRIPE_API_KEY",
            "sk_test_4eC39HqLyjWDarjtT1zdp7dc",
        );
        env::set_var("STREAMBILL__PAYMENT__STRIPE_WEBHOOK_SECRET", "whsec_8f2a1c");
        env::set_var(
            "STREAMBILL__PAYMENT__FRONTEND_URL",
            "https://watch.example.com",
        );
    }

    fn clear_env() {
        env::remove_var("STREAMBILL__DATABASE__URL");
        env::remove_var("STREAMBILL__PAYMENT__STRIPE_API_KEY");
        env::remove_var("STREAMBILL__PAYMENT__STRIPE_WEBHOOK_SECRET");
        env::remove_var("STREAMBILL__PAYMENT__FRONTEND_URL");
        env::remove_var("STREAMBILL__SERVER__PORT");
        env::remove_var("STREAMBILL__SERVER__ENVIRONMENT");
    }

    #[test]
    fn loads_required_sections_from_environment() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        assert_eq!(config.database.url, "postgresql://billing@localhost/streambill");
        assert_eq!(
            config.payment.stripe_api_key,
            "sk_test_4eC39HqLyjWDarjtT1zdp7dc"
        );
    }

    #[test]
    fn loaded_config_passes_validation() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        let result = AppConfig::load();
        clear_env();

        assert!(result.unwrap().validate().is_ok());
    }

    #[test]
    fn server_section_falls_back_to_defaults() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.server.environment, Environment::Development);
    }

    #[test]
    fn environment_variable_overrides_port() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        env::set_var("STREAMBILL__SERVER__PORT", "8443");
        let result = AppConfig::load();
        clear_env();

        assert_eq!(result.unwrap().server.port, 8443);
    }

    #[test]
    fn production_environment_is_detected() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        env::set_var("STREAMBILL__SERVER__ENVIRONMENT", "production");
        let result = AppConfig::load();
        clear_env();

        assert!(result.unwrap().is_production());
    }

    #[test]
    fn webhook_secret_can_be_absent() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        env::remove_var("STREAMBILL__PAYMENT__STRIPE_WEBHOOK_SECRET");
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        assert!(config.payment.stripe_webhook_secret.is_none());
        assert!(config.validate().is_ok());
    }
}
