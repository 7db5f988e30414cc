use crate::alerts::{Alert, AlertSettings};
use crate::errors::Error;
use crate::metrics::{gather_metrics, DEVICE_MISSES_TOTAL};
use crate::model::{DeviceDetail, DeviceState, ErrorBody, Message, Reading};
use crate::store::DeviceStore;
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, TimeDelta, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info_span};

const DEFAULT_READING_HOURS: f64 = 24.0;
const DEFAULT_ALERT_DAYS: f64 = 7.0;

#[derive(Debug, Clone)]
struct AppState {
    store: DeviceStore,
}

#[derive(Debug, Deserialize)]
pub struct ReadingsQuery {
    hours: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct AlertHistoryQuery {
    days: Option<f64>,
}

pub fn create_router(store: DeviceStore) -> Router {
    let state = AppState { store };

    Router::new()
        .route("/devices", get(list_devices))
        .route("/devices/:id", get(get_device))
        .route("/devices/:id/preferences", post(set_preferences))
        .route(
            "/devices/:id/alerts",
            get(get_alert_settings).put(put_alert_settings),
        )
        .route("/devices/:id/alert-history", get(get_alert_history))
        .route("/devices/:id/readings", get(get_readings))
        .route("/data", post(receive_data))
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http().make_span_with(|req: &Request<_>| {
                let request_id = req
                    .headers()
                    .get("x-request-id")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("-");
                info_span!(
                    "http",
                    %request_id,
                    method = %req.method(),
                    uri = %req.uri(),
                )
            }),
        )
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}

async fn list_devices(State(state): State<AppState>) -> Json<Vec<DeviceState>> {
    Json(state.store.list_devices().await)
}

async fn get_device(
    State(state): State<AppState>,
    Path(device_id): Path<String>,
) -> Result<Json<DeviceDetail>, AppError> {
    match state.store.get_device(&device_id).await {
        Ok(detail) => Ok(Json(detail)),
        Err(e) => {
            DEVICE_MISSES_TOTAL.inc();
            Err(e.into())
        }
    }
}

async fn get_readings(
    State(state): State<AppState>,
    Path(device_id): Path<String>,
    Query(params): Query<ReadingsQuery>,
) -> Result<Json<Vec<Reading>>, AppError> {
    let hours = params.hours.unwrap_or(DEFAULT_READING_HOURS);
    let since = window_start(Utc::now(), hours * 3_600_000.0);

    Ok(Json(state.store.readings_since(&device_id, since).await?))
}

async fn get_alert_settings(
    State(state): State<AppState>,
    Path(device_id): Path<String>,
) -> Json<AlertSettings> {
    Json(state.store.alert_settings(&device_id).await)
}

async fn put_alert_settings(
    State(state): State<AppState>,
    Path(device_id): Path<String>,
    body: Bytes,
) -> Result<Json<AlertSettings>, AppError> {
    let settings = serde_json::from_slice::<AlertSettings>(&body)
        .map_err(|e| Error::Validation(format!("Invalid alert settings: {}", e)))?;

    Ok(Json(state.store.set_alert_settings(&device_id, settings).await?))
}

async fn get_alert_history(
    State(state): State<AppState>,
    Path(device_id): Path<String>,
    Query(params): Query<AlertHistoryQuery>,
) -> Result<Json<Vec<Alert>>, AppError> {
    let days = params.days.unwrap_or(DEFAULT_ALERT_DAYS);
    let since = window_start(Utc::now(), days * 86_400_000.0);

    Ok(Json(state.store.alert_history(&device_id, since).await?))
}

/// Start of a look-back window of `millis` ending at `now`. Negative
/// windows are empty; windows reaching past the representable range
/// cover everything.
fn window_start(now: DateTime<Utc>, millis: f64) -> DateTime<Utc> {
    if millis.is_nan() || millis <= 0.0 {
        return now;
    }

    TimeDelta::try_milliseconds(millis as i64)
        .and_then(|window| now.checked_sub_signed(window))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

async fn set_preferences(
    State(state): State<AppState>,
    Path(device_id): Path<String>,
    body: Bytes,
) -> Json<Message> {
    let preferences = serde_json::from_slice::<Value>(&body).unwrap_or(Value::Null);
    state.store.set_preferences(&device_id, preferences).await;

    Json(Message {
        message: "Preferences saved successfully".to_string(),
    })
}

async fn receive_data(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<Message>, AppError> {
    state.store.ingest_payload(&body).await?;

    Ok(Json(Message {
        message: "Data received successfully".to_string(),
    }))
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

async fn metrics() -> Result<String, AppError> {
    Ok(gather_metrics()?)
}

struct AppError(Error);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self.0 {
            Error::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
            Error::NotFound(id) => {
                debug!("Device {} not found", id);
                (StatusCode::NOT_FOUND, "Device not found".to_string())
            }
            other => {
                error!("API error: {}", other);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("Internal server error: {}", other),
                )
            }
        };

        (status, Json(ErrorBody { error: message })).into_response()
    }
}

impl From<Error> for AppError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}
