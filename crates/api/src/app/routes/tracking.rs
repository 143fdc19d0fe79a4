use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get},
    Json, Router,
};

use billtrack_infra::ItemKind;

use crate::app::dto::{TrackItemRequest, TrackItemResponse};
use crate::app::{errors, services::AppServices};
use crate::context::CallerContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_tracked).post(track_item))
        .route("/:item_type/:item_id", delete(untrack_item))
}

pub(crate) fn parse_kind(raw: &str) -> Result<ItemKind, axum::response::Response> {
    raw.parse::<ItemKind>()
        .map_err(|e| errors::json_error(StatusCode::BAD_REQUEST, "invalid_item_type", e.to_string()))
}

/// GET /tracking - The caller's tracked bills and legislators
pub async fn list_tracked(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(caller): Extension<CallerContext>,
) -> axum::response::Response {
    let cancel = services.request_token();
    match services.tracking.list(caller.identity(), &cancel).await {
        Ok(items) => (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

/// POST /tracking - Track a bill or legislator
pub async fn track_item(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(caller): Extension<CallerContext>,
    Json(body): Json<TrackItemRequest>,
) -> axum::response::Response {
    let cancel = services.request_token();
    match services
        .tracking
        .track(caller.identity(), body.item_type, &body.item_id, body.notes, &cancel)
        .await
    {
        Ok(outcome) => {
            let resp = TrackItemResponse::from(outcome);
            let status = if resp.already_tracking { StatusCode::OK } else { StatusCode::CREATED };
            (status, Json(resp)).into_response()
        }
        Err(e) => errors::service_error_to_response(e),
    }
}

/// DELETE /tracking/:item_type/:item_id
pub async fn untrack_item(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(caller): Extension<CallerContext>,
    Path((item_type, item_id)): Path<(String, String)>,
) -> axum::response::Response {
    let kind = match parse_kind(&item_type) {
        Ok(kind) => kind,
        Err(resp) => return resp,
    };

    let cancel = services.request_token();
    match services
        .tracking
        .untrack(caller.identity(), kind, &item_id, &cancel)
        .await
    {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}
