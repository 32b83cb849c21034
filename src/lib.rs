//! Point of Sale backend: client management behind bearer-token auth.
//!
//! The binary in `main.rs` wires configuration, Postgres and the CLI; everything
//! else lives here so integration tests in `tests/` can build the router over
//! an in-memory store.

use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, State},
    http::{HeaderName, HeaderValue, Method, StatusCode},
    routing::get,
    Router,
};
use tower_http::cors::CorsLayer;

pub mod api;
pub mod auth;
pub mod cli;
pub mod config;
pub mod errors;
pub mod middleware;
pub mod models;
pub mod store;

use auth::{AuthService, CredentialHasher, TokenIssuer, UserManager};
use store::Store;

/// Shared application state passed to handlers and middleware.
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub auth: AuthService,
    pub config: config::Config,
}

impl AppState {
    /// Fails when the token settings cannot sign tokens.
    pub fn new(
        config: config::Config,
        store: Arc<dyn Store>,
        hasher: Arc<dyn CredentialHasher>,
    ) -> anyhow::Result<Self> {
        let tokens = TokenIssuer::new(&config.jwt)?;
        let users = UserManager::new(store.identities(), hasher);
        Ok(Self {
            store,
            auth: AuthService::new(users, tokens),
            config,
        })
    }
}

/// Full HTTP application: health probes plus the REST API under `/api`.
pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        // Health endpoints (no auth)
        .route("/healthz", get(|| async { "ok" }))
        .route("/readyz", get(readiness_check))
        .nest("/api", api::api_router(state.clone()))
        .with_state(state.clone())
        // Enforce 25 MB body size limit on all routes
        .layer(DefaultBodyLimit::max(25 * 1024 * 1024))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .layer(cors_layer(&state.config.cors_origin))
        .layer(axum::middleware::from_fn(middleware::security::security_headers))
        .layer(axum::middleware::from_fn(middleware::security::request_id))
}

fn cors_layer(origin: &str) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            HeaderName::from_static("content-type"),
            HeaderName::from_static("authorization"),
            HeaderName::from_static("x-request-id"),
        ]);

    match HeaderValue::from_str(origin) {
        Ok(origin) => layer.allow_origin(origin),
        Err(_) => {
            tracing::warn!(origin, "invalid CORS origin, cross-origin requests disabled");
            layer
        }
    }
}

async fn readiness_check(State(state): State<Arc<AppState>>) -> (StatusCode, &'static str) {
    match state.store.ping().await {
        Ok(()) => (StatusCode::OK, "ok"),
        Err(e) => {
            tracing::warn!("readiness check failed: {}", e);
            (StatusCode::SERVICE_UNAVAILABLE, "unavailable")
        }
    }
}
