//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: membership backend selection and the gated services
//! - `routes/`: HTTP routes + handlers (one file per area)
//! - `dto.rs`: request/response DTOs
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{
    Extension, Router,
    routing::{get, post},
};
use tower::ServiceBuilder;

use crate::config::ApiConfig;
use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

use services::AppServices;

/// Build the full HTTP router from configuration (public entrypoint used by tests).
pub async fn build_app(config: &ApiConfig) -> Result<Router, billtrack_auth::LookupError> {
    let services = Arc::new(services::build_services(config).await?);
    Ok(router(services))
}

/// Assemble the router around already-built services.
pub fn router(services: Arc<AppServices>) -> Router {
    let auth_state = middleware::AuthState {
        provider: services.auth.clone(),
    };

    // Caller-resolved routes: anonymous callers pass through, bad credentials do not.
    let resolved = routes::router().layer(axum::middleware::from_fn_with_state(
        auth_state,
        middleware::auth_middleware,
    ));

    Router::new()
        .route("/health", get(routes::system::health))
        // Verifies its own credential so verification failures surface as evaluation errors.
        .route("/permissions/check", post(routes::permissions::check))
        .merge(resolved)
        .layer(ServiceBuilder::new().layer(Extension(services)))
}
