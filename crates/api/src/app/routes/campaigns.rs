//! Campaign, campaign item and team management endpoints.

use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, patch, post},
    Json, Router,
};

use billtrack_core::{IdentityId, ResourceId};

use crate::app::dto::{
    AddCampaignItemsRequest, AddMemberRequest, CreateCampaignRequest, MemberDto, UpdateRoleRequest,
};
use crate::app::routes::tracking::parse_kind;
use crate::app::{errors, services::AppServices};
use crate::context::CallerContext;

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_campaign))
        .route("/:id", get(get_campaign))
        .route("/:id/items", get(list_items).post(add_items))
        .route("/:id/items/:item_type/:item_id", delete(remove_item))
        .route("/:id/members", get(list_members).post(add_member))
        .route("/:id/members/:user_id", patch(update_member).delete(remove_member))
}

fn parse_member_id(raw: &str) -> Result<IdentityId, axum::response::Response> {
    raw.parse::<IdentityId>()
        .map_err(|e| errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", e.to_string()))
}

/// POST /campaigns - Create a campaign (paid subscription required)
pub async fn create_campaign(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(caller): Extension<CallerContext>,
    Json(body): Json<CreateCampaignRequest>,
) -> axum::response::Response {
    let cancel = services.request_token();
    match services
        .campaigns
        .create(caller.identity(), &body.name, body.description, &cancel)
        .await
    {
        Ok(campaign) => (StatusCode::CREATED, Json(campaign)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

/// GET /campaigns/:id - Campaign details (team members only)
pub async fn get_campaign(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(caller): Extension<CallerContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let cancel = services.request_token();
    match services
        .campaigns
        .get(caller.identity(), &ResourceId::new(id), &cancel)
        .await
    {
        Ok(campaign) => (StatusCode::OK, Json(campaign)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

/// GET /campaigns/:id/items - Bills and legislators on the campaign (team members only)
pub async fn list_items(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(caller): Extension<CallerContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let cancel = services.request_token();
    match services
        .campaigns
        .list_items(caller.identity(), &ResourceId::new(id), &cancel)
        .await
    {
        Ok(items) => (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

/// POST /campaigns/:id/items - Attach items (manager or editor)
pub async fn add_items(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(caller): Extension<CallerContext>,
    Path(id): Path<String>,
    Json(body): Json<AddCampaignItemsRequest>,
) -> axum::response::Response {
    let cancel = services.request_token();
    match services
        .campaigns
        .add_items(caller.identity(), &ResourceId::new(id), body.item_type, &body.item_ids, &cancel)
        .await
    {
        Ok(items) => (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

/// DELETE /campaigns/:id/items/:item_type/:item_id - Detach an item (manager or editor)
pub async fn remove_item(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(caller): Extension<CallerContext>,
    Path((id, item_type, item_id)): Path<(String, String, String)>,
) -> axum::response::Response {
    let kind = match parse_kind(&item_type) {
        Ok(kind) => kind,
        Err(resp) => return resp,
    };

    let cancel = services.request_token();
    match services
        .campaigns
        .remove_item(caller.identity(), &ResourceId::new(id), kind, &item_id, &cancel)
        .await
    {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

/// GET /campaigns/:id/members
pub async fn list_members(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(caller): Extension<CallerContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let cancel = services.request_token();
    match services
        .teams
        .list_members(caller.identity(), &ResourceId::new(id), &cancel)
        .await
    {
        Ok(members) => {
            let members: Vec<MemberDto> = members.into_iter().map(MemberDto::from).collect();
            (StatusCode::OK, Json(serde_json::json!({ "members": members }))).into_response()
        }
        Err(e) => errors::service_error_to_response(e),
    }
}

/// POST /campaigns/:id/members - Add a member (manager only)
pub async fn add_member(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(caller): Extension<CallerContext>,
    Path(id): Path<String>,
    Json(body): Json<AddMemberRequest>,
) -> axum::response::Response {
    let cancel = services.request_token();
    match services
        .teams
        .add_member(caller.identity(), &ResourceId::new(id), body.user_id, body.role, &cancel)
        .await
    {
        Ok(member) => (StatusCode::CREATED, Json(MemberDto::from(member))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

/// PATCH /campaigns/:id/members/:user_id - Change a member's role (manager only)
pub async fn update_member(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(caller): Extension<CallerContext>,
    Path((id, user_id)): Path<(String, String)>,
    Json(body): Json<UpdateRoleRequest>,
) -> axum::response::Response {
    let user_id = match parse_member_id(&user_id) {
        Ok(user_id) => user_id,
        Err(resp) => return resp,
    };

    let cancel = services.request_token();
    match services
        .teams
        .update_role(caller.identity(), &ResourceId::new(id), user_id, body.role, &cancel)
        .await
    {
        Ok(member) => (StatusCode::OK, Json(MemberDto::from(member))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

/// DELETE /campaigns/:id/members/:user_id - Remove a member (manager only)
pub async fn remove_member(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(caller): Extension<CallerContext>,
    Path((id, user_id)): Path<(String, String)>,
) -> axum::response::Response {
    let user_id = match parse_member_id(&user_id) {
        Ok(user_id) => user_id,
        Err(resp) => return resp,
    };

    let cancel = services.request_token();
    match services
        .teams
        .remove_member(caller.identity(), &ResourceId::new(id), user_id, &cancel)
        .await
    {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}
