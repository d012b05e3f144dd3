//! HTTP and WebSocket surface.
//!
//! All routes read from a shared [`QueryStore`] behind one mutex. Queries
//! take the lock briefly and clone out their result; only the deployment
//! actions and run creation mutate. The `/ws/runs/{id}` route upgrades to a
//! per-subscription [`LiveFeed`] loop.
//!
//! Chaos fault injection is opt-in per request: a `chaos=1` query parameter
//! makes the request a candidate for a synthetic 500.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, Query, Request, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{any, get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::chaos::ChaosPolicy;
use crate::config::ServerConfig;
use crate::generator::TemplateRecord;
use crate::live::LiveFeed;
use crate::store::{CreatedRun, Dashboard, Page, QueryStore, StoreError};
use crate::time::TimeSource;
use crate::types::authoring::ConfigError;
use crate::types::stream::{SYNTHETIC_DISCONNECT_CODE, SYNTHETIC_DISCONNECT_REASON};
use crate::types::{
    AuthoringConfig, AuthoringTemplate, ConfigLanguage, ConfigVersion, Deployment, Experiment,
    LogLine, MetricPoint, Model, ModelVersion, Run, RunWithTimeline, Trace,
};

/// Shared state behind every route.
#[derive(Clone)]
#[allow(clippy::disallowed_methods)] // Arc::clone is safe and expected for shared state
pub struct AppState {
    /// The generated dataset, mutated only by deployment actions and run
    /// creation.
    pub store: Arc<Mutex<QueryStore>>,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Fault injection policy for opted-in requests.
    pub chaos: ChaosPolicy,
    /// Clock used to timestamp live events.
    pub time: Arc<dyn TimeSource>,
    /// Counter giving each WebSocket subscription a distinct feed.
    subscriptions: Arc<AtomicU64>,
}

impl AppState {
    #[must_use]
    pub fn new(store: QueryStore, config: Arc<ServerConfig>, time: Arc<dyn TimeSource>) -> Self {
        let chaos = ChaosPolicy::new(config.chaos_rate, config.test_mode);
        Self {
            store: Arc::new(Mutex::new(store)),
            config,
            chaos,
            time,
            subscriptions: Arc::new(AtomicU64::new(0)),
        }
    }
}

/// Wire shape of every error response.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// An error response with its HTTP status.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorBody,
}

impl ApiError {
    fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorBody {
                code,
                message: message.into(),
                details: None,
            },
        }
    }

    fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "BAD_REQUEST", message)
    }

    fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL", message)
    }

    fn chaos() -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            body: ErrorBody {
                code: "CHAOS_500",
                message: "Synthetic 500 (chaos mode). Retry should recover.".to_owned(),
                details: Some(json!({ "hint": "Remove ?chaos=1 to disable failures." })),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { .. } => {
                Self::new(StatusCode::NOT_FOUND, "NOT_FOUND", err.to_string())
            }
            StoreError::Draw(e) => Self::internal(e.to_string()),
        }
    }
}

impl From<ConfigError> for ApiError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Parse(message) => {
                Self::new(StatusCode::BAD_REQUEST, "CONFIG_PARSE_ERROR", message)
            }
            ConfigError::Schema(errors) => Self {
                status: StatusCode::BAD_REQUEST,
                body: ErrorBody {
                    code: "CONFIG_SCHEMA_ERROR",
                    message: "Config failed schema validation.".to_owned(),
                    details: serde_json::to_value(errors).ok(),
                },
            },
        }
    }
}

/// Build the full route table over `state`.
#[allow(clippy::disallowed_methods)] // Arc::clone is safe and expected for shared state
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/dashboard", get(dashboard))
        .route("/experiments", get(list_experiments))
        .route("/experiments/{id}", get(get_experiment))
        .route("/experiments/{id}/runs", get(list_runs))
        .route("/runs", post(create_run))
        .route("/runs/{id}", get(get_run))
        .route("/runs/{id}/logs", get(run_logs))
        .route("/runs/{id}/metrics", get(run_metrics))
        .route("/registry/models", get(list_models))
        .route("/registry/models/{id}/versions", get(list_model_versions))
        .route("/deployments", get(list_deployments))
        .route(
            "/deployments/{id}/simulate-incident",
            post(simulate_incident),
        )
        .route("/deployments/{id}/advance", post(advance_deployment))
        .route("/deployments/{id}/rollback", post(rollback_deployment))
        .route("/traces/{id}", get(get_trace))
        .route("/authoring/templates", get(list_templates))
        .route("/authoring/templates/{id}", get(get_template))
        .route("/config-versions/{id}", get(get_config_version))
        .route("/ws/runs/{id}", any(ws_run))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            chaos_middleware,
        ))
        .with_state(state)
}

/// Whether the request opted into chaos via `chaos=1`.
fn chaos_opt_in(query: Option<&str>) -> bool {
    query.is_some_and(|q| q.split('&').any(|pair| pair == "chaos=1"))
}

async fn chaos_middleware(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let opted_in = chaos_opt_in(request.uri().query());
    if state.chaos.should_fail(opted_in) {
        tracing::debug!("injecting synthetic 500 for {}", request.uri().path());
        return ApiError::chaos().into_response();
    }
    next.run(request).await
}

fn lock_store(state: &AppState) -> Result<MutexGuard<'_, QueryStore>, ApiError> {
    state
        .store
        .lock()
        .map_err(|_| ApiError::internal("store lock poisoned"))
}

async fn health(State(state): State<AppState>) -> Result<Json<serde_json::Value>, ApiError> {
    let store = lock_store(&state)?;
    Ok(Json(json!({ "ok": true, "seed": store.seed() })))
}

async fn dashboard(State(state): State<AppState>) -> Result<Json<Dashboard>, ApiError> {
    let store = lock_store(&state)?;
    Ok(Json(store.dashboard()))
}

async fn list_experiments(State(state): State<AppState>) -> Result<Json<Vec<Experiment>>, ApiError> {
    let store = lock_store(&state)?;
    Ok(Json(store.list_experiments()))
}

async fn get_experiment(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Experiment>, ApiError> {
    let store = lock_store(&state)?;
    Ok(Json(store.get_experiment(&id)?))
}

async fn list_runs(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<Run>>, ApiError> {
    let store = lock_store(&state)?;
    Ok(Json(store.list_runs(&id)?))
}

async fn get_run(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<RunWithTimeline>, ApiError> {
    let store = lock_store(&state)?;
    Ok(Json(store.get_run(&id)?))
}

#[derive(Debug, Deserialize)]
struct LogsQuery {
    cursor: Option<String>,
    limit: Option<String>,
}

async fn run_logs(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<LogsQuery>,
) -> Result<Json<Page<LogLine>>, ApiError> {
    // Non-numeric limits fall back to the default page size.
    let limit = query
        .limit
        .as_deref()
        .and_then(|v| v.parse::<i64>().ok())
        .unwrap_or(200);
    let store = lock_store(&state)?;
    Ok(Json(store.run_logs(&id, query.cursor.as_deref(), limit)?))
}

#[derive(Debug, Deserialize)]
struct MetricsQuery {
    name: Option<String>,
    from: Option<String>,
    to: Option<String>,
}

fn parse_instant(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

async fn run_metrics(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<MetricsQuery>,
) -> Result<Json<Vec<MetricPoint>>, ApiError> {
    let name = query
        .name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .ok_or_else(|| ApiError::bad_request("Missing required query param: name"))?;
    let from = query.from.as_deref().and_then(parse_instant);
    let to = query.to.as_deref().and_then(parse_instant);
    let store = lock_store(&state)?;
    Ok(Json(store.run_metrics(&id, name, from, to)?))
}

async fn list_models(State(state): State<AppState>) -> Result<Json<Vec<Model>>, ApiError> {
    let store = lock_store(&state)?;
    Ok(Json(store.list_models()))
}

async fn list_model_versions(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<ModelVersion>>, ApiError> {
    let store = lock_store(&state)?;
    Ok(Json(store.list_model_versions(&id)?))
}

async fn list_deployments(State(state): State<AppState>) -> Result<Json<Vec<Deployment>>, ApiError> {
    let store = lock_store(&state)?;
    Ok(Json(store.list_deployments()))
}

async fn simulate_incident(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Deployment>, ApiError> {
    let mut store = lock_store(&state)?;
    Ok(Json(store.simulate_incident(&id)?))
}

async fn advance_deployment(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Deployment>, ApiError> {
    let mut store = lock_store(&state)?;
    Ok(Json(store.advance_deployment(&id)?))
}

async fn rollback_deployment(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Deployment>, ApiError> {
    let mut store = lock_store(&state)?;
    Ok(Json(store.rollback_deployment(&id)?))
}

async fn get_trace(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Trace>, ApiError> {
    let store = lock_store(&state)?;
    Ok(Json(store.get_trace(&id)?))
}

async fn list_templates(
    State(state): State<AppState>,
) -> Result<Json<Vec<AuthoringTemplate>>, ApiError> {
    let store = lock_store(&state)?;
    Ok(Json(store.list_templates()))
}

async fn get_template(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<TemplateRecord>, ApiError> {
    let store = lock_store(&state)?;
    Ok(Json(store.get_template(&id)?))
}

async fn get_config_version(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ConfigVersion>, ApiError> {
    let store = lock_store(&state)?;
    Ok(Json(store.get_config_version(&id)?))
}

async fn create_run(
    State(state): State<AppState>,
    Json(body): Json<serde_json::Value>,
) -> Result<(StatusCode, Json<CreatedRun>), ApiError> {
    let language = match body.get("language").and_then(serde_json::Value::as_str) {
        Some("yaml") => ConfigLanguage::Yaml,
        Some("json") => ConfigLanguage::Json,
        _ => {
            return Err(ApiError::bad_request(
                r#"Expected language to be "yaml" or "json"."#,
            ));
        }
    };
    let content = body
        .get("content")
        .and_then(serde_json::Value::as_str)
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("Expected content to be a non-empty string."))?;

    let parsed = AuthoringConfig::from_text(language, content)?;

    let mut store = lock_store(&state)?;
    let created = store.create_run_from_config(None, language, content.to_owned(), &parsed)?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn ws_run(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    tracing::debug!("websocket subscription for run {id}");
    ws.on_upgrade(move |socket| handle_run_socket(socket, state, id))
}

async fn handle_run_socket(mut socket: WebSocket, state: AppState, run_id: String) {
    // Snapshot the run status and last metric values under the lock, then
    // release it for the lifetime of the stream.
    let snapshot = match lock_store(&state) {
        Ok(store) => store.get_run(&run_id).map(|r| {
            let last_values = r.run.metrics_summary.clone();
            (r.run.status, last_values)
        }),
        Err(_) => return,
    };
    let (status, last_values) = match snapshot {
        Ok(snapshot) => snapshot,
        Err(_) => {
            let body = json!({ "code": "NOT_FOUND", "message": format!("Run not found: {run_id}") });
            let _ = socket.send(Message::Text(body.to_string().into())).await;
            let _ = socket.send(Message::Close(None)).await;
            return;
        }
    };

    let subscription = state.subscriptions.fetch_add(1, Ordering::Relaxed);
    let mut feed = LiveFeed::new(&state.config.seed, &run_id, subscription, &last_values);

    if send_event(&mut socket, &feed.status_event(status))
        .await
        .is_err()
    {
        return;
    }

    let synthetic_disconnect = state.config.chaos_disconnect && !state.config.test_mode;
    let disconnect = async {
        if synthetic_disconnect {
            let delay_ms = rand::rng()
                .random_range(state.config.disconnect_min_ms..=state.config.disconnect_max_ms);
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        } else {
            std::future::pending::<()>().await;
        }
    };
    tokio::pin!(disconnect);

    let tick = tokio::time::sleep(feed.tick_delay());
    tokio::pin!(tick);

    loop {
        tokio::select! {
            msg = socket.recv() => {
                match msg {
                    Some(Ok(Message::Ping(data))) => {
                        if socket.send(Message::Pong(data)).await.is_err() {
                            return;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        tracing::debug!("subscriber for run {run_id} disconnected");
                        return;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::warn!("websocket receive error: {e}");
                        return;
                    }
                }
            }
            () = &mut disconnect => {
                tracing::debug!("synthetic disconnect for run {run_id}");
                let frame = CloseFrame {
                    code: SYNTHETIC_DISCONNECT_CODE,
                    reason: SYNTHETIC_DISCONNECT_REASON.into(),
                };
                let _ = socket.send(Message::Close(Some(frame))).await;
                return;
            }
            () = &mut tick => {
                let event = feed.next_event(state.time.now());
                if send_event(&mut socket, &event).await.is_err() {
                    return;
                }
                tick.as_mut().reset(tokio::time::Instant::now() + feed.tick_delay());
            }
        }
    }
}

async fn send_event(
    socket: &mut WebSocket,
    event: &crate::types::RunStreamEvent,
) -> Result<(), ()> {
    let Ok(text) = serde_json::to_string(event) else {
        return Err(());
    };
    socket
        .send(Message::Text(text.into()))
        .await
        .map_err(|_| ())
}
