//! A full booking driven over HTTP with authentication disabled, while the
//! outbox relay runs in the background as it does in the server binary.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use hearth_api::{app, AppConfig, AppState};
use hearth_care::{CareConfig, ManualClock, RelayConfig};
use hearth_core::Timestamp;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tokio::sync::watch;
use tower::ServiceExt;
use uuid::Uuid;

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(value) => {
            builder = builder.header("Content-Type", "application/json");
            Body::from(value.to_string())
        }
        None => Body::empty(),
    };
    let response = app.clone().oneshot(builder.body(body).unwrap()).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

#[tokio::test]
async fn staff_drives_booking_while_relay_delivers() {
    let clock = Arc::new(ManualClock::new(
        Timestamp::parse("2026-03-01T12:00:00Z").unwrap(),
    ));
    let state =
        AppState::with_clock(AppConfig::default(), &CareConfig::default(), clock.clone()).unwrap();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let relay = tokio::spawn(
        state
            .runtime
            .relay(RelayConfig {
                base_delay_ms: 1,
                ..RelayConfig::default()
            })
            .run(shutdown_rx),
    );
    let app = app(state);

    let parent_id = Uuid::new_v4();
    let (status, child) =
        send(&app, "POST", "/v1/children", Some(json!({ "parent_id": parent_id }))).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, booking) = send(
        &app,
        "POST",
        "/v1/bookings",
        Some(json!({
            "parent_id": parent_id,
            "child_ids": [child["child_id"]],
            "room": "pH-2",
            "start": "2026-03-01T19:00:00Z",
            "end": "2026-03-01T23:00:00Z",
            "notes": "Night light stays on",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{booking}");
    assert_eq!(booking["room"], "PH-2");
    let id = booking["id"].as_str().unwrap().to_string();

    let sitter = Uuid::new_v4();
    let calls = [
        ("POST", format!("/v1/bookings/{id}/assign"), Some(json!({ "sitter_id": sitter }))),
        ("PUT", format!("/v1/bookings/{id}/handover/medical"), Some(json!({}))),
        ("POST", format!("/v1/bookings/{id}/handover/advance"), None),
        (
            "PUT",
            format!("/v1/bookings/{id}/handover/emergency-contact"),
            Some(json!({ "name": "Concierge", "phone": "+33 1 42 68 53 00" })),
        ),
        ("POST", format!("/v1/bookings/{id}/handover/advance"), None),
        ("PUT", format!("/v1/bookings/{id}/handover/consent"), Some(json!({ "given": true }))),
        (
            "POST",
            format!("/v1/bookings/{id}/handover/signature"),
            Some(json!({ "party": "parent", "data": "sig", "content_type": "image/png" })),
        ),
    ];
    for (method, uri, body) in calls {
        let (status, body) = send(&app, method, &uri, body).await;
        assert_eq!(status, StatusCode::OK, "{uri}: {body}");
    }

    let finalize = format!("/v1/bookings/{id}/handover/finalize");
    let (status, done) = send(&app, "POST", &finalize, None).await;
    assert_eq!(status, StatusCode::OK, "{done}");
    assert_eq!(done["booking"]["status"], "in_progress");
    assert_eq!(done["handover"]["status"], "complete");

    let (status, session) = send(&app, "GET", &format!("/v1/bookings/{id}/session"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(session["id"], done["session"]["id"]);
    let session_id = session["id"].as_str().unwrap().to_string();

    clock.set(Timestamp::parse("2026-03-01T19:00:00Z").unwrap());
    let (status, _) = send(&app, "POST", &format!("/v1/sessions/{session_id}/start"), None).await;
    assert_eq!(status, StatusCode::OK);
    clock.set(Timestamp::parse("2026-03-01T22:45:00Z").unwrap());
    let (status, ended) = send(&app, "POST", &format!("/v1/sessions/{session_id}/end"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ended["status"], "completed");

    let (status, violations) = send(&app, "GET", "/v1/audit", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(violations, json!([]));

    shutdown_tx.send(true).unwrap();
    let stats = relay.await.unwrap();
    assert_eq!(stats.failed, 0);
    assert!(stats.persisted >= 10);
    assert!(stats.delivered > 0);
}
