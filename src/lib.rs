//! Storefront API Library
//!
//! Product catalog, order placement and role-based authentication for an
//! e-commerce storefront.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod migrator;
pub mod openapi;
pub mod services;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{Json, Response},
    routing::get,
    Router,
};
use sea_orm::DatabaseConnection;
use serde_json::{json, Value};
use std::sync::Arc;

pub use handlers::AppServices;

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub services: AppServices,
}

/// Builds the full application router: liveness/health plus the storefront
/// API surface, with token extraction and the capability-table policy
/// applied.
pub fn app(state: AppState) -> Router {
    let auth_service = state.services.auth.clone();

    Router::new()
        .route("/", get(liveness))
        .route("/health", get(health_check))
        .merge(handlers::products::products_routes())
        .merge(handlers::orders::orders_routes())
        .merge(handlers::auth::auth_routes())
        // Token extraction runs before the per-route policy layers
        .layer(axum::middleware::from_fn(auth::auth_middleware))
        .layer(axum::middleware::from_fn_with_state(
            auth_service,
            inject_auth_service,
        ))
        .with_state(state)
}

/// Makes the auth service available to the token-extraction middleware.
async fn inject_auth_service(
    State(auth): State<Arc<auth::AuthService>>,
    mut request: Request,
    next: Next,
) -> Response {
    request.extensions_mut().insert(auth);
    next.run(request).await
}

async fn liveness() -> &'static str {
    "storefront-api up"
}

async fn health_check(
    State(state): State<AppState>,
) -> Result<Json<Value>, errors::ServiceError> {
    let db_status = match state.db.ping().await {
        Ok(_) => "healthy",
        Err(_) => "unhealthy",
    };

    Ok(Json(json!({
        "status": db_status,
        "checks": {
            "database": db_status,
        },
        "timestamp": chrono::Utc::now().to_rfc3339(),
    })))
}
