//! # Bookings API
//!
//! Creation, sitter assignment, care start/completion, cancellation,
//! listing, and the operator sweep and audit endpoints.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::NaiveDate;
use hearth_care::{BookingFilter, BookingRequest};
use hearth_core::{
    BookingId, CareWindow, ChildId, ConfirmationCode, ParentId, Role, RoomNumber, SitterId,
    Timestamp,
};
use hearth_state::BookingStatus;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::auth::Caller;
use crate::error::AppError;
use crate::extractors::{extract_json, extract_query, extract_validated_json, Validate};
use crate::state::AppState;
use crate::views::{BookingView, ViolationView};

#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct CreateBookingRequest {
    /// Owning parent. Defaults to the caller when the caller is a parent.
    #[serde(default)]
    #[schema(value_type = Option<String>)]
    pub parent_id: Option<ParentId>,
    #[schema(value_type = Vec<String>)]
    pub child_ids: Vec<ChildId>,
    pub room: String,
    /// RFC 3339, UTC.
    pub start: String,
    /// RFC 3339, UTC.
    pub end: String,
    #[serde(default)]
    pub notes: Option<String>,
}

impl Validate for CreateBookingRequest {
    fn validate(&self) -> Result<(), String> {
        if self.start.trim().is_empty() || self.end.trim().is_empty() {
            return Err("start and end must not be empty".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct AssignSitterRequest {
    #[schema(value_type = String)]
    pub sitter_id: SitterId,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct CancelBookingRequest {
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Deserialize)]
pub struct ListBookingsQuery {
    pub status: Option<BookingStatus>,
    pub parent_id: Option<ParentId>,
    pub sitter_id: Option<SitterId>,
    pub date: Option<NaiveDate>,
    pub room: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ExpiredBookings {
    #[schema(value_type = Vec<String>)]
    pub expired: Vec<BookingId>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/bookings", post(create_booking).get(list_bookings))
        .route("/v1/bookings/expire", post(expire_bookings))
        .route("/v1/bookings/by-code/{code}", get(get_booking_by_code))
        .route("/v1/bookings/{id}", get(get_booking))
        .route("/v1/bookings/{id}/assign", post(assign_sitter))
        .route("/v1/bookings/{id}/begin", post(begin_care))
        .route("/v1/bookings/{id}/complete", post(complete_care))
        .route("/v1/bookings/{id}/cancel", post(cancel_booking))
        .route("/v1/audit", get(audit))
}

/// POST /v1/bookings: Request care for one or more children.
#[utoipa::path(
    post,
    path = "/v1/bookings",
    request_body = CreateBookingRequest,
    responses(
        (status = 201, description = "Booking created, pending assignment", body = BookingView),
        (status = 422, description = "Invalid window, children, or room", body = crate::error::ErrorBody),
        (status = 503, description = "Child directory unreachable", body = crate::error::ErrorBody),
    ),
    tag = "bookings"
)]
pub(crate) async fn create_booking(
    State(state): State<AppState>,
    Caller(actor): Caller,
    body: Result<Json<CreateBookingRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<BookingView>), AppError> {
    let req = extract_validated_json(body)?;
    let parent_id = match req.parent_id {
        Some(id) => id,
        None if actor.role == Role::Parent => ParentId::from_uuid(actor.subject),
        None => return Err(AppError::Validation("parent_id is required".into())),
    };
    let window = CareWindow::new(Timestamp::parse(&req.start)?, Timestamp::parse(&req.end)?)?;
    let booking = state.runtime.bookings().create(
        &actor,
        BookingRequest {
            parent_id,
            child_ids: req.child_ids,
            room: RoomNumber::new(req.room)?,
            window,
            notes: req.notes,
        },
    )?;
    Ok((StatusCode::CREATED, Json(BookingView(booking))))
}

/// GET /v1/bookings: Bookings visible to the caller, earliest start first.
#[utoipa::path(
    get,
    path = "/v1/bookings",
    params(
        ("status" = Option<String>, Query, description = "pending, confirmed, in_progress, completed, cancelled"),
        ("parent_id" = Option<String>, Query, description = "Owning parent"),
        ("sitter_id" = Option<String>, Query, description = "Assigned sitter"),
        ("date" = Option<String>, Query, description = "Care date, YYYY-MM-DD"),
        ("room" = Option<String>, Query, description = "Room number"),
    ),
    responses(
        (status = 200, description = "Matching bookings", body = Vec<BookingView>),
    ),
    tag = "bookings"
)]
pub(crate) async fn list_bookings(
    State(state): State<AppState>,
    Caller(actor): Caller,
    query: Result<Query<ListBookingsQuery>, QueryRejection>,
) -> Result<Json<Vec<BookingView>>, AppError> {
    let q = extract_query(query)?;
    let filter = BookingFilter {
        status: q.status,
        parent_id: q.parent_id,
        sitter_id: q.sitter_id,
        date: q.date,
        room: q.room.map(RoomNumber::new).transpose()?,
    };
    let bookings = state.runtime.bookings().list(&actor, &filter);
    Ok(Json(bookings.into_iter().map(BookingView).collect()))
}

/// GET /v1/bookings/{id}
#[utoipa::path(
    get,
    path = "/v1/bookings/{id}",
    params(("id" = String, Path, description = "Booking ID")),
    responses(
        (status = 200, description = "Booking found", body = BookingView),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "bookings"
)]
pub(crate) async fn get_booking(
    State(state): State<AppState>,
    Caller(actor): Caller,
    Path(id): Path<BookingId>,
) -> Result<Json<BookingView>, AppError> {
    Ok(Json(BookingView(state.runtime.bookings().get(&actor, id)?)))
}

/// GET /v1/bookings/by-code/{code}: Look up by confirmation code.
#[utoipa::path(
    get,
    path = "/v1/bookings/by-code/{code}",
    params(("code" = String, Path, description = "Confirmation code, HX-XXXX-XXXX")),
    responses(
        (status = 200, description = "Booking found", body = BookingView),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "bookings"
)]
pub(crate) async fn get_booking_by_code(
    State(state): State<AppState>,
    Caller(actor): Caller,
    Path(code): Path<String>,
) -> Result<Json<BookingView>, AppError> {
    let code = ConfirmationCode::new(code)?;
    Ok(Json(BookingView(state.runtime.bookings().by_code(&actor, &code)?)))
}

/// POST /v1/bookings/{id}/assign: Bind a sitter (staff only).
#[utoipa::path(
    post,
    path = "/v1/bookings/{id}/assign",
    params(("id" = String, Path, description = "Booking ID")),
    request_body = AssignSitterRequest,
    responses(
        (status = 200, description = "Booking confirmed", body = BookingView),
        (status = 409, description = "Sitter already booked or booking not pending", body = crate::error::ErrorBody),
    ),
    tag = "bookings"
)]
pub(crate) async fn assign_sitter(
    State(state): State<AppState>,
    Caller(actor): Caller,
    Path(id): Path<BookingId>,
    body: Result<Json<AssignSitterRequest>, JsonRejection>,
) -> Result<Json<BookingView>, AppError> {
    let req = extract_json(body)?;
    let booking = state.runtime.bookings().assign(&actor, id, req.sitter_id)?;
    Ok(Json(BookingView(booking)))
}

/// POST /v1/bookings/{id}/begin: Start care once the handover is complete.
#[utoipa::path(
    post,
    path = "/v1/bookings/{id}/begin",
    params(("id" = String, Path, description = "Booking ID")),
    responses(
        (status = 200, description = "Booking in progress", body = BookingView),
        (status = 412, description = "Handover not complete", body = crate::error::ErrorBody),
    ),
    tag = "bookings"
)]
pub(crate) async fn begin_care(
    State(state): State<AppState>,
    Caller(actor): Caller,
    Path(id): Path<BookingId>,
) -> Result<Json<BookingView>, AppError> {
    Ok(Json(BookingView(state.runtime.bookings().begin_care(&actor, id)?)))
}

/// POST /v1/bookings/{id}/complete: Close out after the session ended.
#[utoipa::path(
    post,
    path = "/v1/bookings/{id}/complete",
    params(("id" = String, Path, description = "Booking ID")),
    responses(
        (status = 200, description = "Booking completed", body = BookingView),
        (status = 412, description = "Care session has not ended", body = crate::error::ErrorBody),
    ),
    tag = "bookings"
)]
pub(crate) async fn complete_care(
    State(state): State<AppState>,
    Caller(actor): Caller,
    Path(id): Path<BookingId>,
) -> Result<Json<BookingView>, AppError> {
    Ok(Json(BookingView(state.runtime.bookings().complete_care(&actor, id)?)))
}

/// POST /v1/bookings/{id}/cancel: Cancel before care begins.
#[utoipa::path(
    post,
    path = "/v1/bookings/{id}/cancel",
    params(("id" = String, Path, description = "Booking ID")),
    request_body = CancelBookingRequest,
    responses(
        (status = 200, description = "Booking cancelled", body = BookingView),
        (status = 409, description = "Care already started", body = crate::error::ErrorBody),
    ),
    tag = "bookings"
)]
pub(crate) async fn cancel_booking(
    State(state): State<AppState>,
    Caller(actor): Caller,
    Path(id): Path<BookingId>,
    body: Result<Json<CancelBookingRequest>, JsonRejection>,
) -> Result<Json<BookingView>, AppError> {
    // An empty body is a cancellation without a reason.
    let req = match body {
        Err(JsonRejection::MissingJsonContentType(_)) => CancelBookingRequest::default(),
        other => extract_json(other)?,
    };
    let booking = state.runtime.bookings().cancel(&actor, id, &req.reason)?;
    Ok(Json(BookingView(booking)))
}

/// POST /v1/bookings/expire: Cancel pending bookings past the assignment cutoff.
#[utoipa::path(
    post,
    path = "/v1/bookings/expire",
    responses(
        (status = 200, description = "Bookings cancelled by the sweep", body = ExpiredBookings),
        (status = 403, description = "Staff only", body = crate::error::ErrorBody),
    ),
    tag = "bookings"
)]
pub(crate) async fn expire_bookings(
    State(state): State<AppState>,
    Caller(actor): Caller,
) -> Result<Json<ExpiredBookings>, AppError> {
    let expired = state.runtime.bookings().expire_stale(&actor)?;
    Ok(Json(ExpiredBookings { expired }))
}

/// GET /v1/audit: Re-check cross-record invariants (staff only).
#[utoipa::path(
    get,
    path = "/v1/audit",
    responses(
        (status = 200, description = "Invariant violations, empty when healthy", body = Vec<ViolationView>),
        (status = 403, description = "Staff only", body = crate::error::ErrorBody),
    ),
    tag = "bookings"
)]
pub(crate) async fn audit(
    State(state): State<AppState>,
    Caller(actor): Caller,
) -> Result<Json<Vec<ViolationView>>, AppError> {
    if !actor.role.is_operator() {
        return Err(AppError::Care(hearth_core::CareError::Forbidden(
            "audit requires hotel staff".into(),
        )));
    }
    let violations = state.runtime.audit();
    if !violations.is_empty() {
        tracing::warn!(count = violations.len(), "invariant audit found violations");
    }
    Ok(Json(violations.into_iter().map(ViolationView).collect()))
}
