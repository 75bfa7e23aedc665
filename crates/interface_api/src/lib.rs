//! HTTP API Layer
//!
//! This crate provides the REST API for the visit billing engine using Axum.
//!
//! # Architecture
//!
//! - **Handlers**: Request handlers for each domain
//! - **Middleware**: Authentication, actor resolution, request logging
//! - **DTOs**: Request/Response data transfer objects
//! - **Error Handling**: Consistent error responses
//!
//! State carries the storage ports as trait objects, so the same router
//! serves the PostgreSQL adapters in production and the in-memory store
//! in tests and local development.
//!
//! # Example
//!
//! ```rust,ignore
//! use interface_api::{create_router, AppState};
//!
//! let app = create_router(AppState::in_memory(config));
//! axum::serve(listener, app).await?;
//! ```

pub mod auth;
pub mod config;
pub mod dto;
pub mod error;
pub mod handlers;
pub mod middleware;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use domain_audit::AuditSink;
use domain_billing::LedgerStore;
use domain_gateway::{GatewayReconciler, GatewayStore};
use domain_wallet::WalletStore;
use infra_db::{
    DatabasePool, InMemoryStore, PgAuditSink, PgGatewayStore, PgLedgerStore, PgWalletStore,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use crate::config::ApiConfig;
use crate::handlers::{audit, gateway, health, visits, wallets};
use crate::middleware::{auth_middleware, request_log_middleware};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub ledger: Arc<dyn LedgerStore>,
    pub wallets: Arc<dyn WalletStore>,
    pub gateway: Arc<dyn GatewayStore>,
    pub audit: Arc<dyn AuditSink>,
    /// Present only on the PostgreSQL backend; readiness probes ping it
    pub pool: Option<DatabasePool>,
    pub config: ApiConfig,
}

impl AppState {
    /// Wires the handlers to the PostgreSQL adapters
    pub fn postgres(pool: DatabasePool, config: ApiConfig) -> Self {
        Self {
            ledger: Arc::new(PgLedgerStore::new(pool.clone())),
            wallets: Arc::new(PgWalletStore::new(pool.clone())),
            gateway: Arc::new(PgGatewayStore::new(pool.clone())),
            audit: Arc::new(PgAuditSink::new(pool.clone())),
            pool: Some(pool),
            config,
        }
    }

    /// Wires the handlers to one shared in-memory store
    pub fn in_memory(config: ApiConfig) -> Self {
        let store = Arc::new(InMemoryStore::new());
        Self {
            ledger: store.clone(),
            wallets: store.clone(),
            gateway: store.clone(),
            audit: store,
            pool: None,
            config,
        }
    }

    /// The reconciler that turns webhook envelopes into settled payments
    pub fn reconciler(&self) -> GatewayReconciler {
        GatewayReconciler::new(self.gateway.clone())
            .with_verification_timeout(Duration::from_secs(self.config.verification_timeout_secs))
    }
}

/// Creates the main API router
///
/// # Arguments
///
/// * `state` - Application state with storage ports and configuration
///
/// # Returns
///
/// Configured Axum router with all routes and middleware
pub fn create_router(state: AppState) -> Router {
    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/health", get(health::health_check))
        .route("/health/ready", get(health::readiness_check));

    // Visit and ledger routes
    let visit_routes = Router::new()
        .route("/", post(visits::open_visit))
        .route("/:id/billing", get(visits::billing_summary))
        .route("/:id/charges", post(visits::record_charge))
        .route(
            "/:id/charges/:charge_id/reversals",
            post(visits::reverse_charge),
        )
        .route("/:id/payments", post(visits::record_payment))
        .route("/:id/wallet-debits", post(visits::apply_wallet_debit))
        .route(
            "/:id/insurance",
            post(visits::attach_insurance).patch(visits::approve_insurance),
        )
        .route("/:id/close", post(visits::close_visit))
        .route("/:id/gate-checks", post(visits::gate_check))
        .route("/:id/gateway-intents", post(gateway::create_intent))
        .route("/:id/audit", get(audit::visit_trail));

    // Wallet routes
    let wallet_routes = Router::new()
        .route("/", post(wallets::open_wallet))
        .route("/:id", get(wallets::get_wallet))
        .route("/:id/credits", post(wallets::credit_wallet));

    // Protected API routes
    let protected_routes = Router::new()
        .nest("/visits", visit_routes)
        .nest("/wallets", wallet_routes)
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            request_log_middleware,
        ))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    // The webhook authenticates by body signature, not by JWT
    let webhook_routes = Router::new().route("/webhooks/gateway", post(gateway::webhook));

    // Combine all routes
    Router::new()
        .merge(public_routes)
        .nest("/api/v1", protected_routes.merge(webhook_routes))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
