//! Visit Billing - API Server Binary
//!
//! This binary starts the HTTP API server for the visit billing engine.
//!
//! # Usage
//!
//! ```bash
//! # Run against PostgreSQL
//! API_DATABASE_URL=postgres://... cargo run --bin visit-billing-api
//!
//! # Run against the in-memory store (no database required)
//! cargo run --bin visit-billing-api
//! ```
//!
//! # Environment Variables
//!
//! * `API_HOST` - Server host (default: 0.0.0.0)
//! * `API_PORT` - Server port (default: 8080)
//! * `API_JWT_SECRET` - JWT signing secret (required in production)
//! * `API_JWT_EXPIRATION_SECS` - JWT token expiration in seconds (default: 3600)
//! * `API_DATABASE_URL` - PostgreSQL connection string; leave empty for in-memory
//! * `API_WEBHOOK_SECRET` - Shared secret for gateway webhook signatures
//! * `API_VERIFICATION_TIMEOUT_SECS` - Webhook verification timeout in seconds (default: 10)
//! * `API_LOG_LEVEL` - Log level: trace, debug, info, warn, error (default: info)

use interface_api::{config::ApiConfig, create_router, AppState};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Main entry point for the API server.
///
/// Initializes logging, loads configuration, wires the storage backend,
/// and starts the HTTP server.
///
/// # Errors
///
/// Returns an error if:
/// - Configuration cannot be loaded from environment
/// - Database connection or migrations fail
/// - Server fails to bind to the configured address
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (useful for local development)
    dotenvy::dotenv().ok();

    // Load configuration from environment
    let config = load_config();

    // Initialize tracing/logging
    init_tracing(&config.log_level);

    tracing::info!(
        host = %config.host,
        port = %config.port,
        "Starting Visit Billing API Server"
    );

    // Wire the storage backend
    let state = if config.use_in_memory_store() {
        tracing::warn!("No database URL configured; state will not survive a restart");
        AppState::in_memory(config.clone())
    } else {
        let pool = infra_db::create_pool_from_url(&config.database_url).await?;
        infra_db::run_migrations(&pool).await?;
        AppState::postgres(pool, config.clone())
    };

    // Create the API router
    let app = create_router(state);

    // Parse server address
    let addr: SocketAddr = config.server_addr().parse()?;

    tracing::info!(%addr, "Server listening");

    // Create TCP listener and serve; connect info feeds the audit trail's
    // origin fields
    let listener = TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Loads API configuration from environment variables.
///
/// Falls back to default values if environment variables are not set.
fn load_config() -> ApiConfig {
    // Try to load from environment with API_ prefix
    ApiConfig::from_env().unwrap_or_else(|_| {
        // Fall back to individual env vars or defaults
        ApiConfig {
            host: std::env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: std::env::var("API_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),
            jwt_secret: std::env::var("API_JWT_SECRET")
                .unwrap_or_else(|_| "dev-secret-change-in-production".to_string()),
            jwt_expiration_secs: std::env::var("API_JWT_EXPIRATION_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(3600),
            database_url: std::env::var("DATABASE_URL")
                .or_else(|_| std::env::var("API_DATABASE_URL"))
                .unwrap_or_default(),
            webhook_secret: std::env::var("API_WEBHOOK_SECRET")
                .unwrap_or_else(|_| "dev-secret-change-in-production".to_string()),
            verification_timeout_secs: std::env::var("API_VERIFICATION_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10),
            log_level: std::env::var("API_LOG_LEVEL")
                .or_else(|_| std::env::var("RUST_LOG"))
                .unwrap_or_else(|_| "info".to_string()),
        }
    })
}

/// Initializes the tracing subscriber for structured logging.
///
/// # Arguments
///
/// * `log_level` - The minimum log level to output (trace, debug, info, warn, error)
fn init_tracing(log_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
///
/// This enables graceful shutdown of the server, allowing in-flight
/// requests to complete before the process exits.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
