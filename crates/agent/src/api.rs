//! HTTP API: health probes, Prometheus metrics and the alert control surface

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use fleetwatch_lib::{
    health::components, Alert, AlertStats, ComponentStatus, HealthRegistry, Monitor,
    MonitorState, StartOutcome, StopOutcome, ThresholdSet, WatchError, WatchMetrics,
};
use prometheus::{Encoder, TextEncoder};
use serde::{Deserialize, Serialize};
use std::path::{Component, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// Shared application state
pub struct AppState {
    pub health_registry: HealthRegistry,
    pub metrics: WatchMetrics,
    pub monitor: Monitor,
    /// Used by export/load when the request names no file. Its directory
    /// is the only place a request may read or write.
    pub export_path: PathBuf,
}

impl AppState {
    pub fn new(
        health_registry: HealthRegistry,
        metrics: WatchMetrics,
        monitor: Monitor,
        export_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            health_registry,
            metrics,
            monitor,
            export_path: export_path.into(),
        }
    }

    fn refresh_active_gauge(&self) {
        self.metrics.set_alerts_active(self.monitor.store().active_len());
    }

    /// Resolve a requested export file inside the export directory.
    ///
    /// Only a bare file name is accepted; absolute paths, separators and
    /// `..` are rejected.
    fn export_target(&self, requested: Option<PathBuf>) -> Result<PathBuf, ApiError> {
        let Some(requested) = requested else {
            return Ok(self.export_path.clone());
        };

        let mut components = requested.components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(name)), None) => Ok(self
                .export_path
                .parent()
                .map(|dir| dir.join(name))
                .unwrap_or_else(|| PathBuf::from(name))),
            _ => Err(ApiError::BadRequest(format!(
                "path must be a file name inside the export directory: {}",
                requested.display()
            ))),
        }
    }
}

/// Error returned by control handlers, rendered as `{ "error": ... }`
#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    Internal(String),
}

impl From<WatchError> for ApiError {
    fn from(err: WatchError) -> Self {
        if err.is_rejection() {
            ApiError::BadRequest(err.to_string())
        } else {
            ApiError::Internal(err.to_string())
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };
        (status, Json(ErrorBody { error })).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

#[derive(Debug, Default, Deserialize)]
pub struct AlertsQuery {
    #[serde(default)]
    pub all: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AlertUpdated {
    pub id: u64,
    pub updated: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Cleared {
    pub cleared: usize,
}

#[derive(Debug, Deserialize)]
pub struct ThresholdUpdate {
    pub value: f64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MonitorStatus {
    pub state: MonitorState,
    pub interval_secs: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MonitorAction<T> {
    pub outcome: T,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TickSummary {
    pub units_checked: usize,
    pub units_failed: usize,
    pub alerts: Vec<Alert>,
}

/// Export/load request; `path` is a file name within the export directory
#[derive(Debug, Default, Deserialize)]
pub struct PathRequest {
    #[serde(default)]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Exported {
    pub path: PathBuf,
    pub alerts: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Loaded {
    pub path: PathBuf,
    pub alerts: usize,
    pub history: usize,
    pub thresholds_applied: bool,
}

/// Health check response - returns 200 if healthy or degraded, 503 if unhealthy
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_registry.health().await;

    let status_code = match health.status {
        ComponentStatus::Healthy | ComponentStatus::Degraded => StatusCode::OK,
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}

async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health_registry.readiness().await;

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

async fn metrics() -> Result<impl IntoResponse, ApiError> {
    let mut buffer = Vec::new();
    TextEncoder::new()
        .encode(&prometheus::gather(), &mut buffer)
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    Ok((
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        buffer,
    ))
}

async fn list_alerts(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AlertsQuery>,
) -> Json<Vec<Alert>> {
    Json(state.monitor.store().get_active_alerts(!query.all))
}

async fn alert_history(State(state): State<Arc<AppState>>) -> Json<Vec<Alert>> {
    Json(state.monitor.store().get_history())
}

async fn clear_alerts(State(state): State<Arc<AppState>>) -> Json<Cleared> {
    let cleared = state.monitor.store().clear_alerts();
    state.refresh_active_gauge();
    Json(Cleared { cleared })
}

async fn acknowledge_alert(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> ApiResult<AlertUpdated> {
    if state.monitor.store().acknowledge_alert(id) {
        Ok(Json(AlertUpdated { id, updated: true }))
    } else {
        Err(ApiError::NotFound(format!("alert {id} not found")))
    }
}

async fn resolve_alert(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> ApiResult<AlertUpdated> {
    if state.monitor.store().resolve_alert(id) {
        Ok(Json(AlertUpdated { id, updated: true }))
    } else {
        Err(ApiError::NotFound(format!("alert {id} not found")))
    }
}

async fn stats(State(state): State<Arc<AppState>>) -> Json<AlertStats> {
    Json(state.monitor.store().get_stats())
}

async fn get_thresholds(State(state): State<Arc<AppState>>) -> Json<ThresholdSet> {
    Json(state.monitor.engine().thresholds())
}

async fn set_threshold(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
    Json(update): Json<ThresholdUpdate>,
) -> ApiResult<ThresholdSet> {
    let updated = state
        .monitor
        .engine()
        .set_threshold_by_name(&key, update.value)?;
    Ok(Json(updated))
}

async fn monitor_status(State(state): State<Arc<AppState>>) -> Json<MonitorStatus> {
    Json(MonitorStatus {
        state: state.monitor.state(),
        interval_secs: state.monitor.config().interval.as_secs(),
    })
}

async fn start_monitor(State(state): State<Arc<AppState>>) -> Json<MonitorAction<StartOutcome>> {
    let outcome = state.monitor.start();
    if outcome == StartOutcome::Started {
        state.health_registry.set_healthy(components::MONITOR).await;
    }
    Json(MonitorAction { outcome })
}

async fn stop_monitor(State(state): State<Arc<AppState>>) -> Json<MonitorAction<StopOutcome>> {
    Json(MonitorAction {
        outcome: state.monitor.stop().await,
    })
}

async fn run_tick(State(state): State<Arc<AppState>>) -> ApiResult<TickSummary> {
    let report = state
        .monitor
        .run_once()
        .await
        .map_err(|e| ApiError::Internal(format!("{e:#}")))?;

    Ok(Json(TickSummary {
        units_checked: report.units_checked,
        units_failed: report.units_failed,
        alerts: report.alerts,
    }))
}

async fn export_alerts(
    State(state): State<Arc<AppState>>,
    Json(request): Json<PathRequest>,
) -> ApiResult<Exported> {
    let path = state.export_target(request.path)?;
    let thresholds = state.monitor.engine().thresholds();
    let store = state.monitor.store();

    if let Err(e) = store.export_alerts(&path, &thresholds) {
        state
            .health_registry
            .set_degraded(components::ALERT_STORE, e.to_string())
            .await;
        return Err(e.into());
    }
    state.health_registry.set_healthy(components::ALERT_STORE).await;

    Ok(Json(Exported {
        alerts: store.active_len(),
        path,
    }))
}

async fn load_alerts(
    State(state): State<Arc<AppState>>,
    Json(request): Json<PathRequest>,
) -> ApiResult<Loaded> {
    let path = state.export_target(request.path)?;
    let document = state.monitor.store().load_alerts(&path)?;

    let engine = state.monitor.engine();
    let thresholds_applied = match engine.replace_thresholds(document.thresholds) {
        Ok(()) => true,
        Err(e) => {
            warn!(
                path = %path.display(),
                error = %e,
                "Loaded document carries invalid thresholds, keeping current set"
            );
            false
        }
    };
    state.refresh_active_gauge();

    Ok(Json(Loaded {
        path,
        alerts: document.alerts.len(),
        history: document.history.len(),
        thresholds_applied,
    }))
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .route("/api/v1/alerts", get(list_alerts).delete(clear_alerts))
        .route("/api/v1/alerts/history", get(alert_history))
        .route("/api/v1/alerts/export", post(export_alerts))
        .route("/api/v1/alerts/load", post(load_alerts))
        .route("/api/v1/alerts/:id/acknowledge", post(acknowledge_alert))
        .route("/api/v1/alerts/:id/resolve", post(resolve_alert))
        .route("/api/v1/stats", get(stats))
        .route("/api/v1/thresholds", get(get_thresholds))
        .route("/api/v1/thresholds/:key", put(set_threshold))
        .route("/api/v1/monitor", get(monitor_status))
        .route("/api/v1/monitor/start", post(start_monitor))
        .route("/api/v1/monitor/stop", post(stop_monitor))
        .route("/api/v1/monitor/tick", post(run_tick))
        .with_state(state)
}

/// Start the API server
pub async fn serve(port: u16, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = create_router(state);

    let addr = format!("0.0.0.0:{}", port);
    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
