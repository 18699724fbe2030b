//! # Trust Handover API
//!
//! The three-step handover a parent completes before care begins:
//! medical disclosure, emergency contact, consent and signatures.
//! All step endpoints return the full handover record.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use hearth_core::BookingId;
use hearth_state::{EmergencyContact, MedicalDisclosure, SignatureParty};
use serde::Deserialize;
use utoipa::ToSchema;

use crate::auth::Caller;
use crate::error::AppError;
use crate::extractors::{extract_json, extract_validated_json, Validate};
use crate::state::AppState;
use crate::views::{FinalizedView, HandoverView};

#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct MedicalDisclosureRequest {
    /// Free text; empty when the child has none.
    #[serde(default)]
    pub allergies: String,
    #[serde(default)]
    pub medications: String,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct EmergencyContactRequest {
    pub name: String,
    pub phone: String,
    #[serde(default)]
    pub relationship: Option<String>,
}

impl Validate for EmergencyContactRequest {
    fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("name must not be empty".to_string());
        }
        if self.phone.trim().is_empty() {
            return Err("phone must not be empty".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct ConsentRequest {
    pub given: bool,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct SignatureRequest {
    /// `parent` or `sitter`.
    #[schema(value_type = String)]
    pub party: SignatureParty,
    /// Captured signature payload, stored verbatim.
    pub data: String,
    #[serde(default = "default_signature_type")]
    pub content_type: String,
}

fn default_signature_type() -> String {
    "image/svg+xml".to_string()
}

impl Validate for SignatureRequest {
    fn validate(&self) -> Result<(), String> {
        if self.data.is_empty() {
            return Err("data must not be empty".to_string());
        }
        Ok(())
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/bookings/{id}/handover", get(get_handover))
        .route("/v1/bookings/{id}/handover/medical", put(submit_medical))
        .route(
            "/v1/bookings/{id}/handover/emergency-contact",
            put(submit_emergency_contact),
        )
        .route("/v1/bookings/{id}/handover/consent", put(set_consent))
        .route("/v1/bookings/{id}/handover/signature", post(attach_signature))
        .route("/v1/bookings/{id}/handover/advance", post(advance))
        .route("/v1/bookings/{id}/handover/retreat", post(retreat))
        .route("/v1/bookings/{id}/handover/finalize", post(finalize))
}

/// GET /v1/bookings/{id}/handover
#[utoipa::path(
    get,
    path = "/v1/bookings/{id}/handover",
    params(("id" = String, Path, description = "Booking ID")),
    responses(
        (status = 200, description = "Current handover record", body = HandoverView),
        (status = 404, description = "Booking or handover not found", body = crate::error::ErrorBody),
    ),
    tag = "handover"
)]
pub(crate) async fn get_handover(
    State(state): State<AppState>,
    Caller(actor): Caller,
    Path(id): Path<BookingId>,
) -> Result<Json<HandoverView>, AppError> {
    Ok(Json(HandoverView(state.runtime.handovers().view(&actor, id)?)))
}

/// PUT /v1/bookings/{id}/handover/medical: Step 1 data.
#[utoipa::path(
    put,
    path = "/v1/bookings/{id}/handover/medical",
    params(("id" = String, Path, description = "Booking ID")),
    request_body = MedicalDisclosureRequest,
    responses(
        (status = 200, description = "Disclosure recorded", body = HandoverView),
        (status = 409, description = "Handover not at the medical step", body = crate::error::ErrorBody),
    ),
    tag = "handover"
)]
pub(crate) async fn submit_medical(
    State(state): State<AppState>,
    Caller(actor): Caller,
    Path(id): Path<BookingId>,
    body: Result<Json<MedicalDisclosureRequest>, JsonRejection>,
) -> Result<Json<HandoverView>, AppError> {
    let req = extract_json(body)?;
    let disclosure = MedicalDisclosure {
        allergies: req.allergies,
        medications: req.medications,
        notes: req.notes,
    };
    let record = state.runtime.handovers().submit_medical(&actor, id, disclosure)?;
    Ok(Json(HandoverView(record)))
}

/// PUT /v1/bookings/{id}/handover/emergency-contact: Step 2 data.
#[utoipa::path(
    put,
    path = "/v1/bookings/{id}/handover/emergency-contact",
    params(("id" = String, Path, description = "Booking ID")),
    request_body = EmergencyContactRequest,
    responses(
        (status = 200, description = "Contact recorded", body = HandoverView),
        (status = 409, description = "Handover not at the emergency contact step", body = crate::error::ErrorBody),
    ),
    tag = "handover"
)]
pub(crate) async fn submit_emergency_contact(
    State(state): State<AppState>,
    Caller(actor): Caller,
    Path(id): Path<BookingId>,
    body: Result<Json<EmergencyContactRequest>, JsonRejection>,
) -> Result<Json<HandoverView>, AppError> {
    let req = extract_validated_json(body)?;
    let contact = EmergencyContact {
        name: req.name,
        phone: req.phone,
        relationship: req.relationship,
    };
    let record = state
        .runtime
        .handovers()
        .submit_emergency_contact(&actor, id, contact)?;
    Ok(Json(HandoverView(record)))
}

/// PUT /v1/bookings/{id}/handover/consent: Step 3 consent flag.
#[utoipa::path(
    put,
    path = "/v1/bookings/{id}/handover/consent",
    params(("id" = String, Path, description = "Booking ID")),
    request_body = ConsentRequest,
    responses(
        (status = 200, description = "Consent recorded", body = HandoverView),
    ),
    tag = "handover"
)]
pub(crate) async fn set_consent(
    State(state): State<AppState>,
    Caller(actor): Caller,
    Path(id): Path<BookingId>,
    body: Result<Json<ConsentRequest>, JsonRejection>,
) -> Result<Json<HandoverView>, AppError> {
    let req = extract_json(body)?;
    let record = state.runtime.handovers().set_consent(&actor, id, req.given)?;
    Ok(Json(HandoverView(record)))
}

/// POST /v1/bookings/{id}/handover/signature: Store and attach a signature.
#[utoipa::path(
    post,
    path = "/v1/bookings/{id}/handover/signature",
    params(("id" = String, Path, description = "Booking ID")),
    request_body = SignatureRequest,
    responses(
        (status = 200, description = "Signature attached", body = HandoverView),
        (status = 403, description = "Caller may not sign for this party", body = crate::error::ErrorBody),
        (status = 503, description = "Artifact store unavailable", body = crate::error::ErrorBody),
    ),
    tag = "handover"
)]
pub(crate) async fn attach_signature(
    State(state): State<AppState>,
    Caller(actor): Caller,
    Path(id): Path<BookingId>,
    body: Result<Json<SignatureRequest>, JsonRejection>,
) -> Result<Json<HandoverView>, AppError> {
    let req = extract_validated_json(body)?;
    let record = state.runtime.handovers().upload_signature(
        &actor,
        id,
        req.party,
        &req.content_type,
        req.data.as_bytes(),
    )?;
    Ok(Json(HandoverView(record)))
}

/// POST /v1/bookings/{id}/handover/advance: Move to the next step.
#[utoipa::path(
    post,
    path = "/v1/bookings/{id}/handover/advance",
    params(("id" = String, Path, description = "Booking ID")),
    responses(
        (status = 200, description = "Handover advanced", body = HandoverView),
        (status = 422, description = "Current step incomplete", body = crate::error::ErrorBody),
    ),
    tag = "handover"
)]
pub(crate) async fn advance(
    State(state): State<AppState>,
    Caller(actor): Caller,
    Path(id): Path<BookingId>,
) -> Result<Json<HandoverView>, AppError> {
    Ok(Json(HandoverView(state.runtime.handovers().advance(&actor, id)?)))
}

/// POST /v1/bookings/{id}/handover/retreat: Go back one step.
#[utoipa::path(
    post,
    path = "/v1/bookings/{id}/handover/retreat",
    params(("id" = String, Path, description = "Booking ID")),
    responses(
        (status = 200, description = "Handover moved back", body = HandoverView),
        (status = 409, description = "Already at the first step or finalized", body = crate::error::ErrorBody),
    ),
    tag = "handover"
)]
pub(crate) async fn retreat(
    State(state): State<AppState>,
    Caller(actor): Caller,
    Path(id): Path<BookingId>,
) -> Result<Json<HandoverView>, AppError> {
    Ok(Json(HandoverView(state.runtime.handovers().retreat(&actor, id)?)))
}

/// POST /v1/bookings/{id}/handover/finalize: Complete the handover and
/// start care. Repeating it returns the same result.
#[utoipa::path(
    post,
    path = "/v1/bookings/{id}/handover/finalize",
    params(("id" = String, Path, description = "Booking ID")),
    responses(
        (status = 200, description = "Handover complete, session created", body = FinalizedView),
        (status = 422, description = "Consent or signature missing", body = crate::error::ErrorBody),
    ),
    tag = "handover"
)]
pub(crate) async fn finalize(
    State(state): State<AppState>,
    Caller(actor): Caller,
    Path(id): Path<BookingId>,
) -> Result<Json<FinalizedView>, AppError> {
    Ok(Json(FinalizedView(state.runtime.handovers().finalize(&actor, id)?)))
}
