//! # Authentication Middleware
//!
//! Bearer tokens bind a role to a subject id:
//!
//! ```text
//! Bearer {role}:{subject_uuid}:{secret}
//! ```
//!
//! `role` is `parent`, `sitter` or `hotel_staff`; the subject is the
//! parent id, sitter id or staff member id. The `system` role is reserved
//! for internal jobs and never accepted from a token. The secret is
//! compared in constant time.
//!
//! When no secret is configured, authentication is disabled and every
//! request acts as hotel staff.
//!
//! Authorization is not decided here: the authenticated [`Actor`] is
//! handed to the care runtime, which checks ownership per operation.

use axum::extract::{FromRequestParts, Request};
use axum::http::request::Parts;
use axum::http::{header, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use hearth_core::{Actor, Role};
use subtle::ConstantTimeEq;
use uuid::Uuid;

use crate::error::{AppError, ErrorBody, ErrorDetail};

/// The authenticated caller, extracted from request extensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller(pub Actor);

impl<S: Send + Sync> FromRequestParts<S> for Caller {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Caller>()
            .copied()
            .ok_or_else(|| AppError::Unauthorized("no caller identity in request context".into()))
    }
}

/// Auth configuration injected into request extensions.
#[derive(Clone)]
pub struct AuthConfig {
    pub secret: Option<String>,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("secret", &self.secret.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

fn constant_time_eq(provided: &str, expected: &str) -> bool {
    let provided = provided.as_bytes();
    let expected = expected.as_bytes();
    if provided.len() != expected.len() {
        let _ = expected.ct_eq(expected);
        return false;
    }
    provided.ct_eq(expected).into()
}

/// Parse `{role}:{subject}:{secret}` into an [`Actor`].
pub fn parse_bearer_token(provided: &str, expected_secret: &str) -> Result<Actor, String> {
    let parts: Vec<&str> = provided.splitn(3, ':').collect();
    let [role, subject, secret] = parts.as_slice() else {
        return Err("invalid token format, expected {role}:{subject}:{secret}".into());
    };
    if !constant_time_eq(secret, expected_secret) {
        return Err("invalid bearer token".into());
    }
    let role = match Role::parse(role) {
        Some(Role::System) | None => return Err(format!("unknown role: {role}")),
        Some(role) => role,
    };
    let subject = subject
        .parse::<Uuid>()
        .map_err(|e| format!("invalid subject id: {e}"))?;
    Ok(Actor::new(role, subject))
}

/// Validate the bearer token and inject the [`Caller`].
pub async fn auth_middleware(mut request: Request, next: Next) -> Response {
    let secret = request
        .extensions()
        .get::<AuthConfig>()
        .and_then(|c| c.secret.clone());

    let Some(expected) = secret else {
        request
            .extensions_mut()
            .insert(Caller(Actor::staff(Uuid::nil())));
        return next.run(request).await;
    };

    let header_value = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    match header_value {
        Some(value) if value.starts_with("Bearer ") => {
            match parse_bearer_token(&value[7..], &expected) {
                Ok(actor) => {
                    request.extensions_mut().insert(Caller(actor));
                    next.run(request).await
                }
                Err(msg) => {
                    tracing::warn!(reason = %msg, "authentication failed: invalid bearer token");
                    unauthorized_response(&msg)
                }
            }
        }
        Some(_) => {
            tracing::warn!("authentication failed: non-Bearer authorization scheme");
            unauthorized_response("authorization header must use Bearer scheme")
        }
        None => {
            tracing::warn!("authentication failed: missing authorization header");
            unauthorized_response("missing authorization header")
        }
    }
}

fn unauthorized_response(message: &str) -> Response {
    let body = ErrorBody {
        error: ErrorDetail {
            code: "UNAUTHORIZED".to_string(),
            message: message.to_string(),
            details: None,
        },
    };
    (StatusCode::UNAUTHORIZED, Json(body)).into_response()
}
