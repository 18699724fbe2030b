//! # hearth-api: HTTP Surface
//!
//! Axum service over the care runtime. Handlers translate requests into
//! runtime calls with the authenticated [`auth::Caller`]; the runtime
//! decides authorization and every state rule.
//!
//! ## Routes
//!
//! - `/v1/bookings/*`: booking lifecycle, handover, incidents per booking
//! - `/v1/sessions/*`: care sessions, activities, feed, checklist
//! - `/v1/incidents/*`: incident reports and status
//! - `/v1/children`: child registration
//! - `/v1/audit`: cross-record invariant check (staff)
//! - `/openapi.json`: generated OpenAPI document
//! - `/health/*`, `/metrics`: unauthenticated probes and Prometheus scrape
//!
//! ## Middleware Stack (Tower)
//!
//! TraceLayer → MetricsLayer → AuthLayer

pub mod auth;
pub mod config;
pub mod error;
pub mod extractors;
pub mod middleware;
pub mod openapi;
pub mod routes;
pub mod state;
pub mod views;

use axum::extract::State;
use axum::http::StatusCode;
use axum::middleware::from_fn;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::auth::AuthConfig;

pub use config::AppConfig;
pub use error::AppError;
pub use state::AppState;

/// Assemble the application router.
///
/// Health probes and `/metrics` sit outside the auth middleware.
pub fn app(state: AppState) -> Router {
    let auth_config = AuthConfig {
        secret: state.config.auth_secret.clone(),
    };

    let api = Router::new()
        .merge(routes::bookings::router())
        .merge(routes::handover::router())
        .merge(routes::sessions::router())
        .merge(routes::incidents::router())
        .merge(routes::children::router())
        .merge(openapi::router())
        .layer(from_fn(auth::auth_middleware))
        .layer(from_fn(middleware::metrics::metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(axum::Extension(auth_config))
        .with_state(state.clone());

    let probes = Router::new()
        .route("/health/liveness", get(liveness))
        .route("/health/readiness", get(readiness))
        .route("/metrics", get(render_metrics))
        .with_state(state);

    Router::new().merge(probes).merge(api)
}

async fn liveness() -> &'static str {
    "ok"
}

async fn readiness() -> &'static str {
    "ready"
}

async fn render_metrics(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => handle.render().into_response(),
        None => (StatusCode::SERVICE_UNAVAILABLE, "metrics recorder not installed").into_response(),
    }
}
