//! # API Error Types
//!
//! Maps lifecycle errors from `hearth-care` to HTTP status codes and a
//! structured JSON body. Transition errors carry their entity, id and
//! states in `details` so clients can act without parsing messages.
//! Internal error messages are logged, never returned.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use hearth_core::{CareError, ValidationError};
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use utoipa::ToSchema;

/// Structured JSON error response body.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Machine-readable code (e.g. `INVALID_TRANSITION`, `STEP_INCOMPLETE`).
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

#[derive(Error, Debug)]
pub enum AppError {
    /// Request body or query could not be parsed (400).
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Request parsed but failed a surface-level check (422).
    #[error("validation error: {0}")]
    Validation(String),

    /// Missing or invalid credentials (401).
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// A lifecycle operation failed; status follows the error kind.
    #[error(transparent)]
    Care(#[from] CareError),

    /// Internal server error (500). Message is logged but not returned.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            Self::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR"),
            Self::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
            Self::Care(e) => (care_status(e), e.code()),
        }
    }

    fn details(&self) -> Option<serde_json::Value> {
        let Self::Care(e) = self else {
            return None;
        };
        let mut details = match e {
            CareError::Validation(_) | CareError::Forbidden(_) | CareError::Unavailable(_) => {
                json!({})
            }
            CareError::InvalidTransition {
                entity,
                id,
                from,
                to,
            } => json!({ "entity": entity.as_str(), "id": id, "from": from, "to": to }),
            CareError::Precondition {
                entity,
                id,
                state,
                operation,
                requirement,
            } => json!({
                "entity": entity.as_str(),
                "id": id,
                "state": state,
                "operation": operation,
                "requirement": requirement,
            }),
            CareError::Conflict { entity, id, reason } => {
                json!({ "entity": entity.as_str(), "id": id, "reason": reason })
            }
            CareError::InvalidState {
                entity,
                id,
                state,
                operation,
            } => json!({
                "entity": entity.as_str(),
                "id": id,
                "state": state,
                "operation": operation,
            }),
            CareError::StepIncomplete { id, step, missing } => {
                json!({ "entity": "handover", "id": id, "step": step, "missing": missing })
            }
            CareError::NotFound { entity, id } => json!({ "entity": entity.as_str(), "id": id }),
        };
        if e.is_retryable() {
            details["retryable"] = json!(true);
        }
        match details.as_object() {
            Some(map) if map.is_empty() => None,
            _ => Some(details),
        }
    }
}

fn care_status(e: &CareError) -> StatusCode {
    match e {
        CareError::Validation(_) | CareError::StepIncomplete { .. } => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        CareError::InvalidTransition { .. }
        | CareError::Conflict { .. }
        | CareError::InvalidState { .. } => StatusCode::CONFLICT,
        CareError::Precondition { .. } => StatusCode::PRECONDITION_FAILED,
        CareError::NotFound { .. } => StatusCode::NOT_FOUND,
        CareError::Forbidden(_) => StatusCode::FORBIDDEN,
        CareError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        let message = match &self {
            Self::Internal(_) => "An internal error occurred".to_string(),
            other => other.to_string(),
        };
        match &self {
            Self::Internal(_) => tracing::error!(error = %self, "internal server error"),
            Self::Care(CareError::Unavailable(_)) => {
                tracing::warn!(error = %self, "collaborator unavailable")
            }
            _ => {}
        }

        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message,
                details: self.details(),
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        Self::Care(CareError::Validation(err))
    }
}
