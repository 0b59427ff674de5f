use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tower::ServiceExt;
use wp_core::collaborators::{InMemoryTripSheets, LocalChannelHost};
use wp_core::types::{Stop, TripSheet};
use wp_core::{Engine, EngineConfig};
use wp_db::SqliteProvider;
use wp_events::EventBus;
use wp_serve::AppState;

/// One meter of latitude, in degrees.
const METER: f64 = 1.0 / 111_194.93;

fn trip_sheet() -> TripSheet {
    TripSheet {
        trip_id: "T1".to_string(),
        trip_number: "1001".to_string(),
        driver_id: "drv-7".to_string(),
        driver_name: "Dana Ruiz".to_string(),
        driver_phone: None,
        vehicle_number: "TRK-12".to_string(),
        trailer_number: Some("TRL-3".to_string()),
        po_number: "PO-5521".to_string(),
        pickup: Stop {
            name: "ACME Warehouse".to_string(),
            address: "1 Dock Rd".to_string(),
            phone: None,
            appointment: None,
        },
        delivery: Stop {
            name: "Bayside DC".to_string(),
            address: "9 Pier St".to_string(),
            phone: None,
            appointment: None,
        },
        load_description: None,
    }
}

fn setup(config: EngineConfig) -> (TempDir, AppState, Router) {
    let dir = tempfile::tempdir().unwrap();
    let provider = SqliteProvider::new(dir.path().join("waypost.db")).unwrap();
    let engine = Engine::new(
        provider,
        EventBus::new(64),
        Arc::new(InMemoryTripSheets::new([trip_sheet()])),
        Arc::new(LocalChannelHost::new()),
        config,
    );
    let state = AppState::new(engine);
    let app = wp_serve::app(state.clone());
    (dir, state, app)
}

async fn call(
    app: &Router,
    method: Method,
    uri: &str,
    body: Option<Value>,
    actor: Option<&str>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(actor) = actor {
        builder = builder.header("x-actor-id", actor);
    }
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

async fn register_pickup_zone(app: &Router) {
    let (status, zone) = call(
        app,
        Method::POST,
        "/api/zones",
        Some(json!({
            "trip_id": "T1",
            "leg": "pickup",
            "name": "ACME Warehouse",
            "center": { "latitude": 0.0, "longitude": 0.0 },
            "shape": { "kind": "circle", "radius_meters": 200.0 }
        })),
        Some("trip-builder"),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{zone}");
}

fn check_in_body(meters: f64, override_reason: Option<&str>) -> Value {
    json!({
        "trip_id": "T1",
        "leg": "pickup",
        "driver_id": "drv-7",
        "timestamp": "2026-05-01T08:05:00Z",
        "position": { "latitude": meters * METER, "longitude": 0.0 },
        "accuracy_meters": 6.0,
        "override_reason": override_reason
    })
}

#[tokio::test]
async fn health_echoes_correlation_id() {
    let (_dir, _state, app) = setup(EngineConfig::default());
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/health")
                .header("x-correlation-id", "corr-from-client")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("x-correlation-id").unwrap(),
        "corr-from-client"
    );

    let (_, body) = call(&app, Method::GET, "/api/health", None, None).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["audit_alerts"], 0);
}

#[tokio::test]
async fn outside_check_in_reports_distance() {
    let (_dir, _state, app) = setup(EngineConfig::default());
    register_pickup_zone(&app).await;

    let (status, body) = call(
        &app,
        Method::POST,
        "/api/check-ins",
        Some(check_in_body(260.0, None)),
        Some("drv-7"),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "outside_geofence");
    assert_eq!(body["details"]["required_radius_meters"], 200.0);
    let shortfall = body["details"]["shortfall_meters"].as_f64().unwrap();
    assert!((shortfall - 60.0).abs() < 1.0);
    assert!(body["correlation_id"].as_str().unwrap().starts_with("corr_"));
}

#[tokio::test]
async fn malformed_requests_are_rejected() {
    let (_dir, _state, app) = setup(EngineConfig::default());
    register_pickup_zone(&app).await;

    let (status, body) = call(
        &app,
        Method::POST,
        "/api/check-ins",
        Some(json!({ "leg": "pickup", "position": { "latitude": 0.0, "longitude": 0.0 } })),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "invalid_request");

    let (status, body) = call(&app, Method::GET, "/api/notifications/nope", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "invalid_input");

    let (status, _) = call(
        &app,
        Method::GET,
        "/api/notifications/ntf_01HZZZZZZZZZZZZZZZZZZZZZZZ",
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = call(
        &app,
        Method::POST,
        "/api/channels",
        Some(json!({ "leg": "pickup" })),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "invalid_request");
}

#[tokio::test]
async fn dispatcher_flow_from_check_in_to_channel() {
    let (_dir, _state, app) = setup(EngineConfig::default());
    register_pickup_zone(&app).await;

    let (status, event) = call(
        &app,
        Method::POST,
        "/api/check-ins",
        Some(check_in_body(150.0, None)),
        Some("drv-7"),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{event}");
    let (_, replay) = call(
        &app,
        Method::POST,
        "/api/check-ins",
        Some(check_in_body(140.0, None)),
        Some("drv-7"),
    )
    .await;
    assert_eq!(replay["id"], event["id"]);

    let (status, unread) = call(
        &app,
        Method::GET,
        "/api/notifications?status=unread&search=dana",
        None,
        Some("dispatcher-a"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let unread = unread.as_array().unwrap();
    assert_eq!(unread.len(), 1);
    assert_eq!(unread[0]["title"], "Driver pickup check-in");
    let notification_id = unread[0]["id"].as_str().unwrap().to_string();

    let (status, read) = call(
        &app,
        Method::POST,
        &format!("/api/notifications/{notification_id}/read"),
        None,
        Some("dispatcher-a"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(read["read_by"][0]["recipient_group"], "shipping-office");

    let (status, channel) = call(
        &app,
        Method::POST,
        "/api/channels",
        Some(json!({ "notification_id": notification_id })),
        Some("dispatcher-a"),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{channel}");
    assert_eq!(channel["name"], "Trip-1001-ACMEWarehouse");
    assert_eq!(channel["created_by"], "dispatcher-a");

    let (_, again) = call(
        &app,
        Method::POST,
        "/api/channels",
        Some(json!({ "trip_id": "T1", "leg": "pickup" })),
        Some("dispatcher-b"),
    )
    .await;
    assert_eq!(again["id"], channel["id"]);

    let (_, actionable) = call(
        &app,
        Method::GET,
        "/api/notifications?status=actionable",
        None,
        None,
    )
    .await;
    assert!(actionable.as_array().unwrap().is_empty());

    let (_, audit) = call(
        &app,
        Method::GET,
        "/api/audit?action=channel_created",
        None,
        None,
    )
    .await;
    let audit = audit.as_array().unwrap();
    assert_eq!(audit.len(), 1);
    assert_eq!(audit[0]["actor"], "dispatcher-a");

    let (_, events) = call(&app, Method::GET, "/api/events?limit=50", None, None).await;
    let kinds: Vec<&str> = events
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|record| record["body"]["type"].as_str())
        .collect();
    assert!(kinds.contains(&"checkin_requested"));
    assert!(kinds.contains(&"channel_created"));
}

#[tokio::test]
async fn deleting_a_notification_retires_it() {
    let (_dir, _state, app) = setup(EngineConfig::default());
    register_pickup_zone(&app).await;
    call(
        &app,
        Method::POST,
        "/api/check-ins",
        Some(check_in_body(900.0, Some("yard entrance is outside the fence"))),
        Some("drv-7"),
    )
    .await;
    let (_, all) = call(&app, Method::GET, "/api/notifications", None, None).await;
    let id = all[0]["id"].as_str().unwrap().to_string();
    assert_eq!(all[0]["check_in"]["is_override"], true);

    for _ in 0..2 {
        let (status, retired) = call(
            &app,
            Method::DELETE,
            &format!("/api/notifications/{id}"),
            None,
            Some("dispatcher-a"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(retired["retired_at"].is_string());
    }

    let (_, unread) = call(
        &app,
        Method::GET,
        "/api/notifications?status=unread",
        None,
        None,
    )
    .await;
    assert!(unread.as_array().unwrap().is_empty());
    let (_, retirements) = call(
        &app,
        Method::GET,
        "/api/audit?action=notification_retired",
        None,
        None,
    )
    .await;
    assert_eq!(retirements.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn zones_are_listed_and_ranked() {
    let (_dir, _state, app) = setup(EngineConfig::default());
    register_pickup_zone(&app).await;

    let (status, body) = call(
        &app,
        Method::POST,
        "/api/zones",
        Some(json!({
            "trip_id": "T1",
            "leg": "pickup",
            "name": "Duplicate",
            "center": { "latitude": 0.0, "longitude": 0.0 },
            "shape": { "kind": "circle", "radius_meters": 50.0 }
        })),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "conflict");

    let (_, zones) = call(&app, Method::GET, "/api/zones?trip_id=T1", None, None).await;
    let zone_id = zones[0]["id"].as_str().unwrap().to_string();
    let (status, zone) = call(&app, Method::GET, &format!("/api/zones/{zone_id}"), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(zone["shape"]["radius_meters"], 200.0);

    let (_, nearby) = call(
        &app,
        Method::GET,
        "/api/zones/nearby?latitude=0.0005&longitude=0.0&radius_km=1",
        None,
        None,
    )
    .await;
    assert_eq!(nearby[0]["inside"], true);
}

#[tokio::test]
async fn openapi_document_lists_routes() {
    let (_dir, _state, app) = setup(EngineConfig::default());
    let (status, doc) = call(&app, Method::GET, "/api/openapi.json", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(doc["paths"]["/api/check-ins"].is_object());
    assert!(doc["paths"]["/api/notifications/{id}/read"].is_object());
    assert!(doc["paths"]["/api/locations"].is_object());
}

#[tokio::test]
async fn live_topics_are_limited_to_recipient_groups() {
    let (_dir, _state, app) = setup(EngineConfig::default());
    for topic in ["system", "*", "someone-else"] {
        let (status, body) = call(
            &app,
            Method::GET,
            &format!("/api/live/{topic}/subscribe"),
            None,
            Some("dispatcher-a"),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{topic}");
        assert_eq!(body["code"], "not_found");
    }

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/live/shipping-office/subscribe")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        "text/event-stream"
    );
}

#[tokio::test]
async fn tracked_fixes_satisfy_dwell_on_check_in() {
    let (_dir, _state, app) = setup(EngineConfig::default());
    let (status, zone) = call(
        &app,
        Method::POST,
        "/api/zones",
        Some(json!({
            "trip_id": "T1",
            "leg": "pickup",
            "name": "ACME Warehouse",
            "center": { "latitude": 0.0, "longitude": 0.0 },
            "shape": { "kind": "circle", "radius_meters": 200.0 },
            "required_dwell_seconds": 120
        })),
        Some("trip-builder"),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{zone}");

    let (status, early) = call(
        &app,
        Method::POST,
        "/api/check-ins",
        Some(check_in_body(50.0, None)),
        Some("drv-7"),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(early["code"], "dwell_not_satisfied");

    for (timestamp, meters) in [
        ("2026-05-01T08:02:00Z", 900.0),
        ("2026-05-01T08:02:30Z", 80.0),
        ("2026-05-01T08:03:30Z", 60.0),
        ("2026-05-01T08:04:30Z", 55.0),
    ] {
        let (status, fix) = call(
            &app,
            Method::POST,
            "/api/locations",
            Some(json!({
                "driver_id": "drv-7",
                "trip_id": "T1",
                "timestamp": timestamp,
                "position": { "latitude": meters * METER, "longitude": 0.0 },
                "accuracy_meters": 6.0
            })),
            Some("drv-7"),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{fix}");
        assert_eq!(fix["zones"][0]["inside"], meters < 200.0);
    }

    let (status, transitions) = call(
        &app,
        Method::GET,
        "/api/locations/transitions?driver_id=drv-7",
        None,
        Some("dispatcher-a"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(transitions.as_array().unwrap().len(), 1);
    assert_eq!(transitions[0]["kind"], "enter");

    let mut padded = check_in_body(50.0, None);
    padded["trip_id"] = json!(" T1 ");
    let (status, event) = call(&app, Method::POST, "/api/check-ins", Some(padded), Some("drv-7")).await;
    assert_eq!(status, StatusCode::OK, "{event}");
    assert_eq!(event["trip_id"], "T1");
}

#[tokio::test]
async fn location_update_requires_a_driver() {
    let (_dir, _state, app) = setup(EngineConfig::default());
    let (status, body) = call(
        &app,
        Method::POST,
        "/api/locations",
        Some(json!({
            "trip_id": "T1",
            "position": { "latitude": 0.0, "longitude": 0.0 }
        })),
        Some("drv-7"),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "invalid_request");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn auto_channel_rule_opens_channel_for_new_check_in() {
    let config = EngineConfig {
        auto_create_channels: true,
        ..EngineConfig::default()
    };
    let (_dir, state, app) = setup(config);
    let task = wp_serve::auto_channel::spawn(state.clone());
    register_pickup_zone(&app).await;
    call(
        &app,
        Method::POST,
        "/api/check-ins",
        Some(check_in_body(50.0, None)),
        Some("drv-7"),
    )
    .await;

    let mut channels = Vec::new();
    for _ in 0..100 {
        channels = state.engine.channels().list(Some("T1")).unwrap();
        if !channels.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(channels.len(), 1);
    assert_eq!(channels[0].created_by, wp_serve::auto_channel::ACTOR);

    let mut retired = false;
    for _ in 0..100 {
        let notifications = state
            .engine
            .notifications()
            .list(
                &wp_core::RequestContext::system("test"),
                &wp_core::types::NotificationFilter::default(),
            )
            .unwrap();
        if notifications[0].retired_at.is_some() {
            retired = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(retired);
    task.abort();
}
