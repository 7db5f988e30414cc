use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use device_store::{rest::create_router, DeviceStore};
use serde_json::{json, Value};
use tower::util::ServiceExt; // for `oneshot`

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let resp = app.clone().oneshot(request).await.unwrap();
    let status = resp.status();
    let bytes = to_bytes(resp.into_body(), 1024 * 1024).await.unwrap();
    // Extractor rejections from axum come back as plain text.
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
    };
    (status, body)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post(uri: &str, body: String) -> Request<Body> {
    with_body("POST", uri, body)
}

fn put(uri: &str, body: String) -> Request<Body> {
    with_body("PUT", uri, body)
}

fn with_body(method: &str, uri: &str, body: String) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body))
        .unwrap()
}

fn reading(device_id: &str, temperature: f64, timestamp: &str) -> String {
    json!({
        "device_id": device_id,
        "temperature": temperature,
        "humidity": 60.0,
        "flow_rate": 2.1,
        "timestamp": timestamp,
    })
    .to_string()
}

#[tokio::test]
async fn ingest_then_fetch_device() {
    let app = create_router(DeviceStore::new());

    let (status, body) = send(&app, post("/data", reading("d1", 45.0, "t1"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"message": "Data received successfully"}));

    let (status, body) = send(&app, get("/devices/d1")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["device"],
        json!({
            "id": "d1",
            "name": "Unknown Device",
            "status": "Good",
            "temperature": 45.0,
            "humidity": 60.0,
            "flow_rate": 2.1,
            "last_water_flow": "t1",
        })
    );
    assert_eq!(body["analytics"].as_array().unwrap().len(), 1);
    assert_eq!(body["analytics"][0]["device_id"], "d1");
}

#[tokio::test]
async fn hot_reading_marks_device_bad() {
    let app = create_router(DeviceStore::new());
    send(&app, post("/data", reading("d1", 55.0, "t1"))).await;

    let (_, body) = send(&app, get("/devices/d1")).await;
    assert_eq!(body["device"]["status"], "Bad");
}

#[tokio::test]
async fn unknown_device_is_404() {
    let app = create_router(DeviceStore::new());

    let (status, body) = send(&app, get("/devices/missing")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({"error": "Device not found"}));
}

#[tokio::test]
async fn invalid_reading_is_400() {
    let app = create_router(DeviceStore::new());
    let body = json!({"device_id": "d1", "temperature": 20.0}).to_string();

    let (status, body) = send(&app, post("/data", body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("humidity"));

    let (status, _) = send(&app, post("/data", "not json".to_string())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, devices) = send(&app, get("/devices")).await;
    assert_eq!(devices, json!([]));
}

#[tokio::test]
async fn list_devices_returns_states() {
    let app = create_router(DeviceStore::new());
    send(&app, post("/data", reading("a", 10.0, "t1"))).await;
    send(&app, post("/data", reading("b", 90.0, "t1"))).await;
    send(&app, post("/data", reading("a", 20.0, "t2"))).await;

    let (status, body) = send(&app, get("/devices")).await;
    assert_eq!(status, StatusCode::OK);

    let devices = body.as_array().unwrap();
    assert_eq!(devices.len(), 2);
    assert_eq!(devices[0]["id"], "a");
    assert_eq!(devices[0]["temperature"], 20.0);
    assert_eq!(devices[1]["status"], "Bad");
}

#[tokio::test]
async fn preferences_always_acknowledged() {
    let app = create_router(DeviceStore::new());
    let expected = json!({"message": "Preferences saved successfully"});

    let (status, body) = send(
        &app,
        post("/devices/anything/preferences", json!({"alerts": true}).to_string()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, expected);

    let (status, body) = send(&app, post("/devices/x/preferences", String::new())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, expected);

    let (status, _) = send(&app, get("/devices/anything")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn health_reports_ok() {
    let app = create_router(DeviceStore::new());

    let (status, body) = send(&app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert!(body["timestamp"].is_string());
}

#[tokio::test]
async fn responses_carry_request_id() {
    let app = create_router(DeviceStore::new());

    let resp = app.oneshot(get("/devices")).await.unwrap();
    assert!(resp.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn analytics_echo_submitted_reading() {
    let app = create_router(DeviceStore::new());
    let submitted = json!({
        "device_id": "d1",
        "temperature": 45,
        "humidity": 60,
        "flow_rate": 2,
        "timestamp": "2024-05-01T10:00:00Z",
        "battery": 97
    });

    send(&app, post("/data", submitted.to_string())).await;

    let (_, body) = send(&app, get("/devices/d1")).await;
    assert_eq!(body["analytics"], json!([submitted]));
    assert_eq!(body["device"]["temperature"], json!(45));
    assert_eq!(body["device"]["humidity"], json!(60));
}

#[tokio::test]
async fn alert_settings_round_trip() {
    let app = create_router(DeviceStore::new());

    let (status, defaults) = send(&app, get("/devices/d1/alerts")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(defaults["alerts_enabled"], false);
    assert_eq!(defaults["temperature_min"], 20.0);
    assert_eq!(defaults["flow_rate_max"], 3.0);

    let update = json!({"alerts_enabled": true, "temperature_alert_enabled": true, "temperature_max": 30.0});
    let (status, saved) = send(&app, put("/devices/d1/alerts", update.to_string())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(saved["temperature_max"], 30.0);
    assert_eq!(saved["humidity_min"], 45.0);

    let (_, fetched) = send(&app, get("/devices/d1/alerts")).await;
    assert_eq!(fetched, saved);
}

#[tokio::test]
async fn bad_alert_settings_are_400() {
    let app = create_router(DeviceStore::new());

    let inverted = json!({"humidity_min": 80.0, "humidity_max": 20.0}).to_string();
    let (status, body) = send(&app, put("/devices/d1/alerts", inverted)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("Humidity"));

    let (status, _) = send(&app, put("/devices/d1/alerts", "nope".to_string())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn out_of_range_reading_lands_in_alert_history() {
    let app = create_router(DeviceStore::new());
    let settings = json!({"alerts_enabled": true, "temperature_alert_enabled": true});
    send(&app, put("/devices/d1/alerts", settings.to_string())).await;

    send(&app, post("/data", reading("d1", 22.0, "t1"))).await;
    send(&app, post("/data", reading("d1", 35.0, "t2"))).await;

    let (status, body) = send(&app, get("/devices/d1/alert-history")).await;
    assert_eq!(status, StatusCode::OK);
    let alerts = body.as_array().unwrap();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0]["alert_type"], "temperature");
    assert_eq!(alerts[0]["message"], "Temperature out of range");
    assert_eq!(alerts[0]["value"], 35.0);
    assert_eq!(alerts[0]["threshold"], "20-25");

    let (_, body) = send(&app, get("/devices/d1/alert-history?days=0")).await;
    assert_eq!(body, json!([]));

    let (status, _) = send(&app, get("/devices/missing/alert-history")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn readings_window() {
    let app = create_router(DeviceStore::new());
    send(&app, post("/data", reading("d1", 20.0, "t1"))).await;
    send(&app, post("/data", reading("d1", 21.0, "t2"))).await;

    let (status, body) = send(&app, get("/devices/d1/readings")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 2);
    assert_eq!(body[0]["timestamp"], "t1");

    let (_, body) = send(&app, get("/devices/d1/readings?hours=0.5")).await;
    assert_eq!(body.as_array().unwrap().len(), 2);

    let (status, _) = send(&app, get("/devices/d1/readings?hours=lots")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, get("/devices/missing/readings")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
