//! Child registration against the in-process directory.
//!
//! Stands in for the guest profile service: bookings may only name
//! children registered here to the booking parent.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use hearth_core::{CareError, ChildId, ParentId, Role};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::auth::Caller;
use crate::error::AppError;
use crate::extractors::extract_json;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct RegisterChildRequest {
    /// Required for staff; parents always register their own children.
    #[serde(default)]
    #[schema(value_type = Option<String>)]
    pub parent_id: Option<ParentId>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RegisteredChild {
    #[schema(value_type = String)]
    pub child_id: ChildId,
    #[schema(value_type = String)]
    pub parent_id: ParentId,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/v1/children", post(register_child))
}

/// POST /v1/children
#[utoipa::path(
    post,
    path = "/v1/children",
    request_body = RegisterChildRequest,
    responses(
        (status = 201, description = "Child registered", body = RegisteredChild),
        (status = 403, description = "Sitters cannot register children", body = crate::error::ErrorBody),
    ),
    tag = "children"
)]
pub(crate) async fn register_child(
    State(state): State<AppState>,
    Caller(actor): Caller,
    body: Result<Json<RegisterChildRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<RegisteredChild>), AppError> {
    let req = match body {
        Err(JsonRejection::MissingJsonContentType(_)) => RegisterChildRequest::default(),
        other => extract_json(other)?,
    };
    let parent_id = match (actor.role, req.parent_id) {
        (Role::Parent, Some(id)) if *id.as_uuid() != actor.subject => {
            return Err(CareError::Forbidden("parents register only their own children".into()).into())
        }
        (Role::Parent, _) => ParentId::from_uuid(actor.subject),
        (role, Some(id)) if role.is_operator() => id,
        (role, None) if role.is_operator() => {
            return Err(AppError::Validation("parent_id is required".into()))
        }
        _ => return Err(CareError::Forbidden("only parents and staff register children".into()).into()),
    };
    let child_id = state.children.register(parent_id);
    tracing::info!(%child_id, %parent_id, "child registered");
    Ok((StatusCode::CREATED, Json(RegisteredChild { child_id, parent_id })))
}
