use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};

use crate::app::dto::WhoAmIResponse;
use crate::context::CallerContext;

pub async fn health() -> StatusCode {
    StatusCode::OK
}

/// Tier and display-only capability flags for the current caller.
pub async fn whoami(Extension(caller): Extension<CallerContext>) -> impl IntoResponse {
    Json(WhoAmIResponse::new(caller.identity(), caller.tier()))
}
