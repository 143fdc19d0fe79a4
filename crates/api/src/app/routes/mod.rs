use axum::{routing::get, Router};

pub mod campaigns;
pub mod permissions;
pub mod system;
pub mod tracking;

/// Router for endpoints that run behind the caller-resolving middleware.
pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .nest("/campaigns", campaigns::router())
        .nest("/tracking", tracking::router())
}
