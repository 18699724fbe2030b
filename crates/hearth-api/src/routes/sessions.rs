//! # Care Session API
//!
//! Session start/end, the activity ledger and its feed, the pre-care
//! checklist, and elapsed time.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use hearth_core::{ActivityEventId, BookingId, CareError, EntityKind, SessionId, Timestamp};
use hearth_state::{ActivityDraft, ActivityKind, ChecklistItem, Mood, SessionStatus};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::auth::Caller;
use crate::error::AppError;
use crate::extractors::{extract_json, extract_query, extract_validated_json, Validate};
use crate::state::AppState;
use crate::views::{ActivityView, FeedView, SessionView};

#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct RecordActivityRequest {
    /// photo, status, meal, nap, incident, checkin
    #[schema(value_type = String)]
    pub kind: ActivityKind,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    #[schema(value_type = Option<String>)]
    pub mood: Option<Mood>,
    #[serde(default)]
    pub subtext: Option<String>,
    /// RFC 3339; defaults to the server clock.
    #[serde(default)]
    pub occurred_at: Option<String>,
    /// An earlier event this one corrects.
    #[serde(default)]
    #[schema(value_type = Option<String>)]
    pub corrects: Option<ActivityEventId>,
}

impl RecordActivityRequest {
    fn into_draft(self) -> Result<ActivityDraft, AppError> {
        let mut draft = ActivityDraft::new(self.kind, self.content);
        draft.subtext = self.subtext;
        if let Some(mood) = self.mood {
            draft = draft.with_mood(mood);
        }
        if let Some(ts) = self.occurred_at {
            draft = draft.at(Timestamp::parse(&ts)?);
        }
        if let Some(id) = self.corrects {
            draft = draft.correcting(id);
        }
        Ok(draft)
    }
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct UploadPhotoRequest {
    pub data: String,
    #[serde(default = "default_photo_type")]
    pub content_type: String,
    #[serde(default)]
    pub caption: String,
    #[serde(default)]
    #[schema(value_type = Option<String>)]
    pub mood: Option<Mood>,
}

fn default_photo_type() -> String {
    "image/jpeg".to_string()
}

impl Validate for UploadPhotoRequest {
    fn validate(&self) -> Result<(), String> {
        if self.data.is_empty() {
            return Err("data must not be empty".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
pub struct FeedQuery {
    #[serde(default)]
    pub since: u64,
    #[serde(default)]
    pub limit: usize,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ChecklistToggled {
    pub item: String,
    pub checked: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ElapsedResponse {
    #[schema(value_type = String)]
    pub session_id: SessionId,
    #[schema(value_type = String)]
    pub status: SessionStatus,
    pub elapsed_seconds: i64,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/bookings/{id}/session", get(session_for_booking))
        .route("/v1/sessions/{id}", get(get_session))
        .route("/v1/sessions/{id}/start", post(start_session))
        .route("/v1/sessions/{id}/end", post(end_session))
        .route("/v1/sessions/{id}/activities", post(record_activity))
        .route("/v1/sessions/{id}/photos", post(upload_photo))
        .route("/v1/sessions/{id}/feed", get(feed))
        .route("/v1/sessions/{id}/checklist/{item}/toggle", post(toggle_checklist))
        .route("/v1/sessions/{id}/elapsed", get(elapsed))
}

/// GET /v1/bookings/{id}/session: The session created at finalize.
#[utoipa::path(
    get,
    path = "/v1/bookings/{id}/session",
    params(("id" = String, Path, description = "Booking ID")),
    responses(
        (status = 200, description = "Care session", body = SessionView),
        (status = 404, description = "No session yet", body = crate::error::ErrorBody),
    ),
    tag = "sessions"
)]
pub(crate) async fn session_for_booking(
    State(state): State<AppState>,
    Caller(actor): Caller,
    Path(id): Path<BookingId>,
) -> Result<Json<SessionView>, AppError> {
    let file = state.runtime.bookings().care_file(&actor, id)?;
    let session = file
        .session
        .ok_or_else(|| CareError::not_found(EntityKind::Session, id))?;
    Ok(Json(SessionView(session)))
}

/// GET /v1/sessions/{id}
#[utoipa::path(
    get,
    path = "/v1/sessions/{id}",
    params(("id" = String, Path, description = "Session ID")),
    responses(
        (status = 200, description = "Care session", body = SessionView),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "sessions"
)]
pub(crate) async fn get_session(
    State(state): State<AppState>,
    Caller(actor): Caller,
    Path(id): Path<SessionId>,
) -> Result<Json<SessionView>, AppError> {
    Ok(Json(SessionView(state.runtime.sessions().get(&actor, id)?)))
}

/// POST /v1/sessions/{id}/start: Sitter starts care.
#[utoipa::path(
    post,
    path = "/v1/sessions/{id}/start",
    params(("id" = String, Path, description = "Session ID")),
    responses(
        (status = 200, description = "Session active", body = SessionView),
        (status = 412, description = "Booking not in progress", body = crate::error::ErrorBody),
    ),
    tag = "sessions"
)]
pub(crate) async fn start_session(
    State(state): State<AppState>,
    Caller(actor): Caller,
    Path(id): Path<SessionId>,
) -> Result<Json<SessionView>, AppError> {
    Ok(Json(SessionView(state.runtime.sessions().start(&actor, id)?)))
}

/// POST /v1/sessions/{id}/end: End care and complete the booking.
#[utoipa::path(
    post,
    path = "/v1/sessions/{id}/end",
    params(("id" = String, Path, description = "Session ID")),
    responses(
        (status = 200, description = "Session completed", body = SessionView),
        (status = 409, description = "Session not active", body = crate::error::ErrorBody),
    ),
    tag = "sessions"
)]
pub(crate) async fn end_session(
    State(state): State<AppState>,
    Caller(actor): Caller,
    Path(id): Path<SessionId>,
) -> Result<Json<SessionView>, AppError> {
    Ok(Json(SessionView(state.runtime.sessions().end(&actor, id)?)))
}

/// POST /v1/sessions/{id}/activities: Append to the activity ledger.
#[utoipa::path(
    post,
    path = "/v1/sessions/{id}/activities",
    params(("id" = String, Path, description = "Session ID")),
    request_body = RecordActivityRequest,
    responses(
        (status = 201, description = "Event appended", body = ActivityView),
        (status = 409, description = "Session not active", body = crate::error::ErrorBody),
        (status = 422, description = "Invalid event", body = crate::error::ErrorBody),
    ),
    tag = "sessions"
)]
pub(crate) async fn record_activity(
    State(state): State<AppState>,
    Caller(actor): Caller,
    Path(id): Path<SessionId>,
    body: Result<Json<RecordActivityRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ActivityView>), AppError> {
    let draft = extract_json(body)?.into_draft()?;
    let event = state.runtime.sessions().record_activity(&actor, id, draft)?;
    Ok((StatusCode::CREATED, Json(ActivityView(event))))
}

/// POST /v1/sessions/{id}/photos: Store a photo and append a photo event.
#[utoipa::path(
    post,
    path = "/v1/sessions/{id}/photos",
    params(("id" = String, Path, description = "Session ID")),
    request_body = UploadPhotoRequest,
    responses(
        (status = 201, description = "Photo event appended", body = ActivityView),
        (status = 503, description = "Artifact store unavailable", body = crate::error::ErrorBody),
    ),
    tag = "sessions"
)]
pub(crate) async fn upload_photo(
    State(state): State<AppState>,
    Caller(actor): Caller,
    Path(id): Path<SessionId>,
    body: Result<Json<UploadPhotoRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ActivityView>), AppError> {
    let req = extract_validated_json(body)?;
    let event = state.runtime.sessions().upload_photo(
        &actor,
        id,
        &req.content_type,
        req.data.as_bytes(),
        &req.caption,
        req.mood,
    )?;
    Ok((StatusCode::CREATED, Json(ActivityView(event))))
}

/// GET /v1/sessions/{id}/feed: Events after a cursor, oldest first.
#[utoipa::path(
    get,
    path = "/v1/sessions/{id}/feed",
    params(
        ("id" = String, Path, description = "Session ID"),
        ("since" = Option<u64>, Query, description = "Return events after this sequence number"),
        ("limit" = Option<usize>, Query, description = "Page size; 0 or absent uses the default"),
    ),
    responses(
        (status = 200, description = "Feed page", body = FeedView),
    ),
    tag = "sessions"
)]
pub(crate) async fn feed(
    State(state): State<AppState>,
    Caller(actor): Caller,
    Path(id): Path<SessionId>,
    query: Result<Query<FeedQuery>, QueryRejection>,
) -> Result<Json<FeedView>, AppError> {
    let q = extract_query(query)?;
    let page = state.runtime.sessions().feed(&actor, id, q.since, q.limit)?;
    Ok(Json(FeedView(page)))
}

/// POST /v1/sessions/{id}/checklist/{item}/toggle
#[utoipa::path(
    post,
    path = "/v1/sessions/{id}/checklist/{item}/toggle",
    params(
        ("id" = String, Path, description = "Session ID"),
        ("item" = String, Path, description = "room_safety_checked, child_info_confirmed, supplies_ready, emergency_contacts_reviewed"),
    ),
    responses(
        (status = 200, description = "New value of the item", body = ChecklistToggled),
        (status = 422, description = "Unknown item", body = crate::error::ErrorBody),
    ),
    tag = "sessions"
)]
pub(crate) async fn toggle_checklist(
    State(state): State<AppState>,
    Caller(actor): Caller,
    Path((id, item)): Path<(SessionId, String)>,
) -> Result<Json<ChecklistToggled>, AppError> {
    let item = ChecklistItem::parse(&item)?;
    let checked = state.runtime.sessions().toggle_checklist(&actor, id, item)?;
    Ok(Json(ChecklistToggled {
        item: item.as_str().to_string(),
        checked,
    }))
}

/// GET /v1/sessions/{id}/elapsed
#[utoipa::path(
    get,
    path = "/v1/sessions/{id}/elapsed",
    params(("id" = String, Path, description = "Session ID")),
    responses(
        (status = 200, description = "Time in care so far", body = ElapsedResponse),
    ),
    tag = "sessions"
)]
pub(crate) async fn elapsed(
    State(state): State<AppState>,
    Caller(actor): Caller,
    Path(id): Path<SessionId>,
) -> Result<Json<ElapsedResponse>, AppError> {
    let sessions = state.runtime.sessions();
    let elapsed = sessions.elapsed(&actor, id)?;
    let session = sessions.get(&actor, id)?;
    Ok(Json(ElapsedResponse {
        session_id: id,
        status: session.status,
        elapsed_seconds: elapsed.num_seconds(),
    }))
}
