//! Permission check endpoint.
//!
//! Clients call this before (or while) invoking a mutating operation; the
//! answer is authoritative where the client-side tier gate is only advisory.

use std::sync::Arc;

use axum::{
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};

use crate::app::dto::{PermissionCheckRequest, PermissionCheckResponse};
use crate::app::errors;
use crate::app::services::AppServices;
use crate::middleware::extract_bearer;

/// POST /permissions/check
///
/// A denial is a normal `200` with `allowed: false`; only infrastructure
/// failures produce error statuses.
pub async fn check(
    Extension(services): Extension<Arc<AppServices>>,
    headers: HeaderMap,
    Json(body): Json<PermissionCheckRequest>,
) -> axum::response::Response {
    let credential = match extract_bearer(&headers) {
        Ok(credential) => credential,
        Err(status) => {
            return errors::json_error(status, "unauthorized", "malformed authorization header");
        }
    };

    let cancel = services.request_token();
    let result = services
        .evaluator
        .evaluate_credential(
            services.auth.as_ref(),
            credential,
            body.action,
            body.resource_id.as_ref(),
            &cancel,
        )
        .await;

    match result {
        Ok((identity, decision)) => {
            let body = PermissionCheckResponse::new(identity.as_ref(), &decision);
            (StatusCode::OK, Json(body)).into_response()
        }
        Err(e) => errors::evaluation_error_to_response(e),
    }
}
