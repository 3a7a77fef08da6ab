//! HTTP listener settings.
//!
//! Covers the bind address, deploy environment, log filtering, and the CORS
//! allowlist for the browser-facing checkout endpoints. Webhook traffic is
//! server-to-server and ignores CORS entirely.

use serde::Deserialize;
use std::net::SocketAddr;

use super::error::ValidationError;

/// Listener and environment settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Interface to bind.
    #[serde(default = "ServerConfig::default_host")]
    pub host: String,

    /// TCP port to listen on.
    #[serde(default = "ServerConfig::default_port")]
    pub port: u16,

    /// Deploy environment; gates log verbosity and test-mode warnings.
    #[serde(default)]
    pub environment: Environment,

    /// `tracing_subscriber::EnvFilter` directive used when `RUST_LOG` is
    /// absent.
    #[serde(default = "ServerConfig::default_log_level")]
    pub log_level: String,

    /// Per-request timeout in seconds.
    #[serde(default = "ServerConfig::default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Comma-separated origin allowlist for browser calls; unset means no
    /// CORS headers are emitted.
    pub cors_origins: Option<String>,
}

/// Deploy environment.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl ServerConfig {
    fn default_host() -> String {
        "0.0.0.0".to_string()
    }

    fn default_port() -> u16 {
        3000
    }

    fn default_log_level() -> String {
        "info,streambill=debug,sqlx=warn".to_string()
    }

    fn default_request_timeout_secs() -> u64 {
        30
    }

    /// Bind address assembled from `host` and `port`.
    ///
    /// `validate` has already confirmed the host parses, so this cannot
    /// panic on validated configuration.
    pub fn socket_addr(&self) -> SocketAddr {
        format!("{}:{}", self.host, self.port)
            .parse()
            .expect("validated host and port form a socket address")
    }

    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }

    /// Parsed CORS allowlist; empty segments from trailing commas are
    /// dropped.
    pub fn cors_origins_list(&self) -> Vec<String> {
        self.cors_origins
            .as_deref()
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|origin| !origin.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.host.parse::<std::net::IpAddr>().is_err() {
            return Err(ValidationError::Missing {
                field: "STREAMBILL__SERVER__HOST",
            });
        }
        if self.port == 0 {
            return Err(ValidationError::PortZero);
        }
        if !(1..=300).contains(&self.request_timeout_secs) {
            return Err(ValidationError::TimeoutOutOfRange(
                self.request_timeout_secs,
            ));
        }
        Ok(())
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: Self::default_host(),
            port: Self::default_port(),
            environment: Environment::default(),
            log_level: Self::default_log_level(),
            request_timeout_secs: Self::default_request_timeout_secs(),
            cors_origins: None,
        }
    }
}
