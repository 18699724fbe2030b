//! # OpenAPI Document Assembly
//!
//! Collects every documented route into one OpenAPI document served at
//! `/openapi.json`.

use axum::routing::get;
use axum::{Json, Router};
use utoipa::OpenApi;

use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Hearth Care API",
        version = "0.1.0",
        description = "Booking and care-session lifecycle for in-room hotel childcare: bookings, trust handover, care sessions, activity feed, and incidents."
    ),
    paths(
        // Bookings
        crate::routes::bookings::create_booking,
        crate::routes::bookings::list_bookings,
        crate::routes::bookings::get_booking,
        crate::routes::bookings::get_booking_by_code,
        crate::routes::bookings::assign_sitter,
        crate::routes::bookings::begin_care,
        crate::routes::bookings::complete_care,
        crate::routes::bookings::cancel_booking,
        crate::routes::bookings::expire_bookings,
        crate::routes::bookings::audit,
        // Handover
        crate::routes::handover::get_handover,
        crate::routes::handover::submit_medical,
        crate::routes::handover::submit_emergency_contact,
        crate::routes::handover::set_consent,
        crate::routes::handover::attach_signature,
        crate::routes::handover::advance,
        crate::routes::handover::retreat,
        crate::routes::handover::finalize,
        // Sessions
        crate::routes::sessions::session_for_booking,
        crate::routes::sessions::get_session,
        crate::routes::sessions::start_session,
        crate::routes::sessions::end_session,
        crate::routes::sessions::record_activity,
        crate::routes::sessions::upload_photo,
        crate::routes::sessions::feed,
        crate::routes::sessions::toggle_checklist,
        crate::routes::sessions::elapsed,
        // Incidents
        crate::routes::incidents::report_incident,
        crate::routes::incidents::get_incident,
        crate::routes::incidents::update_status,
        crate::routes::incidents::list_for_booking,
        // Children
        crate::routes::children::register_child,
    ),
    components(schemas(
        crate::views::BookingView,
        crate::views::HandoverView,
        crate::views::FinalizedView,
        crate::views::SessionView,
        crate::views::ActivityView,
        crate::views::FeedView,
        crate::views::IncidentView,
        crate::views::ViolationView,
        crate::error::ErrorBody,
        crate::error::ErrorDetail,
        crate::routes::bookings::CreateBookingRequest,
        crate::routes::bookings::AssignSitterRequest,
        crate::routes::bookings::CancelBookingRequest,
        crate::routes::bookings::ExpiredBookings,
        crate::routes::handover::MedicalDisclosureRequest,
        crate::routes::handover::EmergencyContactRequest,
        crate::routes::handover::ConsentRequest,
        crate::routes::handover::SignatureRequest,
        crate::routes::sessions::RecordActivityRequest,
        crate::routes::sessions::UploadPhotoRequest,
        crate::routes::sessions::ChecklistToggled,
        crate::routes::sessions::ElapsedResponse,
        crate::routes::incidents::ReportIncidentRequest,
        crate::routes::incidents::UpdateIncidentStatusRequest,
        crate::routes::children::RegisterChildRequest,
        crate::routes::children::RegisteredChild,
    )),
    tags(
        (name = "bookings", description = "Booking lifecycle and operator sweeps"),
        (name = "handover", description = "Three-step trust handover"),
        (name = "sessions", description = "Care sessions, activity feed, checklist"),
        (name = "incidents", description = "Incident reports and escalation"),
        (name = "children", description = "Child registration"),
    )
)]
pub struct ApiDoc;

pub fn router() -> Router<AppState> {
    Router::new().route("/openapi.json", get(openapi_json))
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
