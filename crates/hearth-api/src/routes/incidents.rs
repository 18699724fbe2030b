//! # Incidents API
//!
//! Reporting against a booking or a session, staff status updates, and
//! per-booking listing. A critical report aborts an active session and
//! flags the booking in the same commit.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use hearth_care::IncidentReport;
use hearth_core::{BookingId, IncidentId, SessionId};
use hearth_state::{IncidentCategory, IncidentStatus, IncidentSubject, Severity};
use serde::Deserialize;
use utoipa::ToSchema;

use crate::auth::Caller;
use crate::error::AppError;
use crate::extractors::{extract_json, extract_validated_json, Validate};
use crate::state::AppState;
use crate::views::IncidentView;

/// Exactly one of `booking_id` and `session_id` must be set.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct ReportIncidentRequest {
    #[serde(default)]
    #[schema(value_type = Option<String>)]
    pub booking_id: Option<BookingId>,
    #[serde(default)]
    #[schema(value_type = Option<String>)]
    pub session_id: Option<SessionId>,
    /// low, medium, high, critical
    #[schema(value_type = String)]
    pub severity: Severity,
    #[schema(value_type = String)]
    pub category: IncidentCategory,
    pub summary: String,
}

impl ReportIncidentRequest {
    fn subject(&self) -> Option<IncidentSubject> {
        match (self.booking_id, self.session_id) {
            (Some(id), None) => Some(IncidentSubject::Booking(id)),
            (None, Some(id)) => Some(IncidentSubject::Session(id)),
            _ => None,
        }
    }
}

impl Validate for ReportIncidentRequest {
    fn validate(&self) -> Result<(), String> {
        if self.subject().is_none() {
            return Err("exactly one of booking_id and session_id is required".to_string());
        }
        if self.summary.trim().is_empty() {
            return Err("summary must not be empty".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct UpdateIncidentStatusRequest {
    /// investigating or resolved
    #[schema(value_type = String)]
    pub status: IncidentStatus,
    #[serde(default)]
    pub note: Option<String>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/incidents", post(report_incident))
        .route("/v1/incidents/{id}", get(get_incident))
        .route("/v1/incidents/{id}/status", post(update_status))
        .route("/v1/bookings/{id}/incidents", get(list_for_booking))
}

/// POST /v1/incidents
#[utoipa::path(
    post,
    path = "/v1/incidents",
    request_body = ReportIncidentRequest,
    responses(
        (status = 201, description = "Incident recorded", body = IncidentView),
        (status = 422, description = "Subject missing or ambiguous", body = crate::error::ErrorBody),
        (status = 404, description = "Booking or session not found", body = crate::error::ErrorBody),
    ),
    tag = "incidents"
)]
pub(crate) async fn report_incident(
    State(state): State<AppState>,
    Caller(actor): Caller,
    body: Result<Json<ReportIncidentRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<IncidentView>), AppError> {
    let req = extract_validated_json(body)?;
    let Some(subject) = req.subject() else {
        return Err(AppError::Validation(
            "exactly one of booking_id and session_id is required".into(),
        ));
    };
    let incident = state.runtime.incidents().report(
        &actor,
        IncidentReport {
            subject,
            severity: req.severity,
            category: req.category,
            summary: req.summary,
        },
    )?;
    Ok((StatusCode::CREATED, Json(IncidentView(incident))))
}

/// GET /v1/incidents/{id}
#[utoipa::path(
    get,
    path = "/v1/incidents/{id}",
    params(("id" = String, Path, description = "Incident ID")),
    responses(
        (status = 200, description = "Incident found", body = IncidentView),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "incidents"
)]
pub(crate) async fn get_incident(
    State(state): State<AppState>,
    Caller(actor): Caller,
    Path(id): Path<IncidentId>,
) -> Result<Json<IncidentView>, AppError> {
    Ok(Json(IncidentView(state.runtime.incidents().get(&actor, id)?)))
}

/// POST /v1/incidents/{id}/status: Staff only.
#[utoipa::path(
    post,
    path = "/v1/incidents/{id}/status",
    params(("id" = String, Path, description = "Incident ID")),
    request_body = UpdateIncidentStatusRequest,
    responses(
        (status = 200, description = "Status updated", body = IncidentView),
        (status = 403, description = "Staff only", body = crate::error::ErrorBody),
        (status = 409, description = "Transition not allowed", body = crate::error::ErrorBody),
    ),
    tag = "incidents"
)]
pub(crate) async fn update_status(
    State(state): State<AppState>,
    Caller(actor): Caller,
    Path(id): Path<IncidentId>,
    body: Result<Json<UpdateIncidentStatusRequest>, JsonRejection>,
) -> Result<Json<IncidentView>, AppError> {
    let req = extract_json(body)?;
    let incident = state
        .runtime
        .incidents()
        .update_status(&actor, id, req.status, req.note.as_deref())?;
    Ok(Json(IncidentView(incident)))
}

/// GET /v1/bookings/{id}/incidents: Oldest first.
#[utoipa::path(
    get,
    path = "/v1/bookings/{id}/incidents",
    params(("id" = String, Path, description = "Booking ID")),
    responses(
        (status = 200, description = "Incidents on the booking", body = Vec<IncidentView>),
    ),
    tag = "incidents"
)]
pub(crate) async fn list_for_booking(
    State(state): State<AppState>,
    Caller(actor): Caller,
    Path(id): Path<BookingId>,
) -> Result<Json<Vec<IncidentView>>, AppError> {
    let incidents = state.runtime.incidents().list_for_booking(&actor, id)?;
    Ok(Json(incidents.into_iter().map(IncidentView).collect()))
}
