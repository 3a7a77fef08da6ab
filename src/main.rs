//! StreamBill server binary.
//!
//! Loads configuration, connects to PostgreSQL, wires the Stripe client and
//! storage adapters into the HTTP router, and serves until shutdown.

use std::sync::Arc;
use std::time::Duration;

use axum::http::{header, HeaderName, Method};
use secrecy::SecretString;
use sqlx::postgres::PgPoolOptions;
use tokio::sync::watch;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use streambill::adapters::http::{billing_router, BillingAppState};
use streambill::adapters::postgres::{
    PostgresLedgerStore, PostgresPlanCatalog, PostgresProcessedEventLog,
};
use streambill::adapters::stripe::{StripeBillingProvider, StripeConfig};
use streambill::application::RetentionSweeper;
use streambill::config::AppConfig;
use streambill::ports::ProcessedEventLog;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let config = AppConfig::load()?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.server.log_level)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    config.validate()?;
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        environment = ?config.server.environment,
        test_mode = config.payment.is_test_mode(),
        "starting streambill"
    );

    let pool = PgPoolOptions::new()
        .min_connections(config.database.min_connections)
        .max_connections(config.database.max_connections)
        .acquire_timeout(config.database.acquire_timeout())
        .idle_timeout(config.database.idle_timeout())
        .max_lifetime(config.database.max_lifetime())
        .connect(&config.database.url)
        .await?;
    tracing::info!("database connection established");

    if config.database.run_migrations {
        tracing::info!("running database migrations");
        sqlx::migrate!("./migrations").run(&pool).await?;
    }

    let webhook_secret = config
        .payment
        .stripe_webhook_secret
        .clone()
        .map(SecretString::new);
    if webhook_secret.is_none() {
        tracing::warn!(
            "no webhook signing secret configured; deliveries will be rejected until \
             STREAMBILL__PAYMENT__STRIPE_WEBHOOK_SECRET is set"
        );
    }

    let provider = StripeBillingProvider::new(StripeConfig::new(
        config.payment.stripe_api_key.clone(),
    ));

    let event_log: Arc<PostgresProcessedEventLog> =
        Arc::new(PostgresProcessedEventLog::new(pool.clone()));

    let state = BillingAppState {
        ledger: Arc::new(PostgresLedgerStore::new(pool.clone())),
        catalog: Arc::new(PostgresPlanCatalog::new(pool.clone())),
        provider: Arc::new(provider),
        event_log: Arc::clone(&event_log) as Arc<dyn ProcessedEventLog>,
        webhook_secret,
        frontend_url: config.payment.frontend_url.clone(),
    };

    let (sweep_shutdown_tx, sweep_shutdown_rx) = watch::channel(false);
    let sweeper = RetentionSweeper::new(event_log);
    let sweeper_handle = tokio::spawn(async move { sweeper.run(sweep_shutdown_rx).await });

    let app = billing_router()
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.server.request_timeout_secs,
        )))
        .layer(cors_layer(&config));

    let addr = config.server.socket_addr();
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "streambill listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let _ = sweep_shutdown_tx.send(true);
    let _ = sweeper_handle.await;

    Ok(())
}

fn cors_layer(config: &AppConfig) -> CorsLayer {
    let origins: Vec<_> = config
        .server
        .cors_origins_list()
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    if origins.is_empty() {
        // No explicit origins configured: same-origin deployments and
        // webhook traffic need no CORS at all.
        CorsLayer::new()
    } else {
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods([Method::GET, Method::POST])
            .allow_headers([header::CONTENT_TYPE, HeaderName::from_static("x-user-id")])
    }
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("shutdown signal received"),
        Err(error) => tracing::error!(error = %error, "failed to listen for shutdown signal"),
    }
}
