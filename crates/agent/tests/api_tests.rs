//! Integration tests for the agent API endpoints

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    Router,
};
use fleetwatch_agent::api::{create_router, AppState};
use fleetwatch_lib::{
    collector::async_trait, health::components, AlertStore, HealthRegistry, MetricsSnapshot,
    MonitorBuilder, RuleEngine, StateSnapshot, UnitInfo, UnitSource, WatchMetrics,
};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tower::ServiceExt;

/// Two units: `web` with critical CPU and `db` with high memory
struct FixedSource;

#[async_trait]
impl UnitSource for FixedSource {
    async fn list_units(&self) -> anyhow::Result<Vec<UnitInfo>> {
        Ok(vec![UnitInfo::new("web", "web"), UnitInfo::new("db", "db")])
    }

    async fn fetch_metrics(&self, unit: &UnitInfo) -> anyhow::Result<MetricsSnapshot> {
        Ok(match unit.id.as_str() {
            "web" => MetricsSnapshot {
                cpu_percent: 95.0,
                memory_percent: 20.0,
                pids: 4,
            },
            _ => MetricsSnapshot {
                cpu_percent: 10.0,
                memory_percent: 80.0,
                pids: 4,
            },
        })
    }

    async fn fetch_state(&self, _unit: &UnitInfo) -> anyhow::Result<StateSnapshot> {
        Ok(StateSnapshot {
            status: "running".to_string(),
            restart_count: 0,
            oom_killed: false,
        })
    }
}

async fn setup_test_app(export_dir: &TempDir) -> (Router, Arc<AppState>) {
    let health_registry = HealthRegistry::for_agent().await;
    let metrics = WatchMetrics::new();

    let monitor = MonitorBuilder::new()
        .source(Arc::new(FixedSource))
        .engine(Arc::new(RuleEngine::new()))
        .store(Arc::new(AlertStore::new()))
        .interval(Duration::from_secs(60))
        .health(health_registry.clone())
        .metrics(metrics.clone())
        .build()
        .unwrap();

    let state = Arc::new(AppState::new(
        health_registry,
        metrics,
        monitor,
        export_dir.path().join("alerts.json"),
    ));
    let router = create_router(state.clone());

    (router, state)
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let request = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => request
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => request.body(Body::empty()).unwrap(),
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

async fn tick(app: &Router) -> Value {
    let (status, body) = send(app, Method::POST, "/api/v1/monitor/tick", None).await;
    assert_eq!(status, StatusCode::OK);
    body
}

#[tokio::test]
async fn test_healthz_returns_ok_when_healthy() {
    let dir = TempDir::new().unwrap();
    let (app, _state) = setup_test_app(&dir).await;

    let (status, health) = send(&app, Method::GET, "/healthz", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(health["status"], "healthy");
    assert_eq!(health["components"]["monitor"]["status"], "healthy");
}

#[tokio::test]
async fn test_healthz_returns_ok_when_degraded() {
    let dir = TempDir::new().unwrap();
    let (app, state) = setup_test_app(&dir).await;

    state
        .health_registry
        .set_degraded(components::MONITOR, "monitor not started")
        .await;

    // Degraded still returns 200 (operational)
    let (status, health) = send(&app, Method::GET, "/healthz", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(health["status"], "degraded");
}

#[tokio::test]
async fn test_healthz_returns_503_when_unhealthy() {
    let dir = TempDir::new().unwrap();
    let (app, state) = setup_test_app(&dir).await;

    state
        .health_registry
        .set_unhealthy(components::UNIT_SOURCE, "hierarchy missing")
        .await;

    let (status, health) = send(&app, Method::GET, "/healthz", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(health["status"], "unhealthy");
}

#[tokio::test]
async fn test_readyz_follows_ready_flag() {
    let dir = TempDir::new().unwrap();
    let (app, state) = setup_test_app(&dir).await;

    let (status, readiness) = send(&app, Method::GET, "/readyz", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(readiness["ready"], false);

    state.health_registry.set_ready(true).await;

    let (status, readiness) = send(&app, Method::GET, "/readyz", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(readiness["ready"], true);
}

#[tokio::test]
async fn test_metrics_endpoint_exposes_watch_metrics() {
    let dir = TempDir::new().unwrap();
    let (app, _state) = setup_test_app(&dir).await;
    tick(&app).await;

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();

    assert!(text.contains("fleetwatch_ticks_total"));
    assert!(text.contains("fleetwatch_anomalies_total"));
    assert!(text.contains("fleetwatch_alerts_active"));
}

#[tokio::test]
async fn test_tick_raises_alerts() {
    let dir = TempDir::new().unwrap();
    let (app, _state) = setup_test_app(&dir).await;

    let summary = tick(&app).await;
    assert_eq!(summary["units_checked"], 2);
    assert_eq!(summary["units_failed"], 0);

    let alerts = summary["alerts"].as_array().unwrap();
    assert_eq!(alerts.len(), 2);
    assert_eq!(alerts[0]["id"], 1);
    assert_eq!(alerts[0]["unit_name"], "web");
    assert_eq!(alerts[0]["anomaly"]["type"], "CPU");
    assert_eq!(alerts[0]["urgency"], "HIGH");
    assert_eq!(alerts[1]["unit_name"], "db");
    assert_eq!(alerts[1]["anomaly"]["level"], "WARNING");
}

#[tokio::test]
async fn test_acknowledge_hides_alert_from_default_listing() {
    let dir = TempDir::new().unwrap();
    let (app, _state) = setup_test_app(&dir).await;
    tick(&app).await;

    let (status, body) = send(&app, Method::POST, "/api/v1/alerts/1/acknowledge", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "id": 1, "updated": true }));

    let (_, unacked) = send(&app, Method::GET, "/api/v1/alerts", None).await;
    let ids: Vec<u64> = unacked
        .as_array()
        .unwrap()
        .iter()
        .map(|a| a["id"].as_u64().unwrap())
        .collect();
    assert_eq!(ids, vec![2]);

    let (_, all) = send(&app, Method::GET, "/api/v1/alerts?all=true", None).await;
    assert_eq!(all.as_array().unwrap().len(), 2);
    assert_eq!(all[0]["acknowledged"], true);
}

#[tokio::test]
async fn test_unknown_alert_is_404() {
    let dir = TempDir::new().unwrap();
    let (app, _state) = setup_test_app(&dir).await;

    let (status, body) = send(&app, Method::POST, "/api/v1/alerts/42/acknowledge", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "alert 42 not found");

    let (status, _) = send(&app, Method::POST, "/api/v1/alerts/42/resolve", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_resolve_updates_stats() {
    let dir = TempDir::new().unwrap();
    let (app, _state) = setup_test_app(&dir).await;
    tick(&app).await;

    let (status, _) = send(&app, Method::POST, "/api/v1/alerts/2/resolve", None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, stats) = send(&app, Method::GET, "/api/v1/stats", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["total"], 2);
    assert_eq!(stats["critical"], 1);
    assert_eq!(stats["warning"], 1);
    assert_eq!(stats["resolved"], 1);
    assert_eq!(stats["active"], 1);
}

#[tokio::test]
async fn test_clear_keeps_history() {
    let dir = TempDir::new().unwrap();
    let (app, _state) = setup_test_app(&dir).await;
    tick(&app).await;

    let (status, body) = send(&app, Method::DELETE, "/api/v1/alerts", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["cleared"], 2);

    let (_, active) = send(&app, Method::GET, "/api/v1/alerts?all=true", None).await;
    assert!(active.as_array().unwrap().is_empty());

    let (_, history) = send(&app, Method::GET, "/api/v1/alerts/history", None).await;
    assert_eq!(history.as_array().unwrap().len(), 2);

    // Ids keep counting after a clear
    let summary = tick(&app).await;
    assert_eq!(summary["alerts"][0]["id"], 3);
}

#[tokio::test]
async fn test_threshold_get_and_set() {
    let dir = TempDir::new().unwrap();
    let (app, _state) = setup_test_app(&dir).await;

    let (status, thresholds) = send(&app, Method::GET, "/api/v1/thresholds", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(thresholds["cpu_warning"], 70.0);
    assert_eq!(thresholds["memory_critical"], 90.0);

    let (status, updated) = send(
        &app,
        Method::PUT,
        "/api/v1/thresholds/cpu_critical",
        Some(json!({ "value": 99.0 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["cpu_critical"], 99.0);

    // 95% CPU is now only a warning
    let summary = tick(&app).await;
    assert_eq!(summary["alerts"][0]["anomaly"]["level"], "WARNING");
}

#[tokio::test]
async fn test_invalid_threshold_is_400() {
    let dir = TempDir::new().unwrap();
    let (app, _state) = setup_test_app(&dir).await;

    let (status, body) = send(
        &app,
        Method::PUT,
        "/api/v1/thresholds/cpu_warning",
        Some(json!({ "value": 95.0 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("cpu_critical"));

    let (status, _) = send(
        &app,
        Method::PUT,
        "/api/v1/thresholds/disk_warning",
        Some(json!({ "value": 50.0 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, thresholds) = send(&app, Method::GET, "/api/v1/thresholds", None).await;
    assert_eq!(thresholds["cpu_warning"], 70.0);
}

#[tokio::test]
async fn test_monitor_start_stop() {
    let dir = TempDir::new().unwrap();
    let (app, _state) = setup_test_app(&dir).await;

    let (_, status) = send(&app, Method::GET, "/api/v1/monitor", None).await;
    assert_eq!(status["state"], "idle");
    assert_eq!(status["interval_secs"], 60);

    let (_, body) = send(&app, Method::POST, "/api/v1/monitor/start", None).await;
    assert_eq!(body["outcome"], "started");
    let (_, body) = send(&app, Method::POST, "/api/v1/monitor/start", None).await;
    assert_eq!(body["outcome"], "already_running");

    let (_, status) = send(&app, Method::GET, "/api/v1/monitor", None).await;
    assert_eq!(status["state"], "running");

    let (_, body) = send(&app, Method::POST, "/api/v1/monitor/stop", None).await;
    assert_eq!(body["outcome"], "stopped");
    let (_, body) = send(&app, Method::POST, "/api/v1/monitor/stop", None).await;
    assert_eq!(body["outcome"], "not_running");
}

#[tokio::test]
async fn test_export_then_load_restores_alerts() {
    let dir = TempDir::new().unwrap();
    let (app, _state) = setup_test_app(&dir).await;
    tick(&app).await;
    send(&app, Method::POST, "/api/v1/alerts/1/acknowledge", None).await;

    let export = Some(json!({}));
    let (status, exported) = send(&app, Method::POST, "/api/v1/alerts/export", export).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(exported["alerts"], 2);
    assert!(dir.path().join("alerts.json").exists());

    // Fresh agent, same file
    let (fresh, _fresh_state) = setup_test_app(&dir).await;
    let load = Some(json!({}));
    let (status, loaded) = send(&fresh, Method::POST, "/api/v1/alerts/load", load).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(loaded["alerts"], 2);
    assert_eq!(loaded["thresholds_applied"], true);

    let (_, all) = send(&fresh, Method::GET, "/api/v1/alerts?all=true", None).await;
    assert_eq!(all[0]["acknowledged"], true);

    // New ids continue after the loaded ones
    let summary = tick(&fresh).await;
    assert_eq!(summary["alerts"][0]["id"], 3);
}

#[tokio::test]
async fn test_load_malformed_file_leaves_state() {
    let dir = TempDir::new().unwrap();
    let (app, _state) = setup_test_app(&dir).await;
    tick(&app).await;

    std::fs::write(dir.path().join("bad.json"), "{ not json").unwrap();

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/alerts/load",
        Some(json!({ "path": "bad.json" })),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].as_str().is_some());

    let (_, all) = send(&app, Method::GET, "/api/v1/alerts?all=true", None).await;
    assert_eq!(all.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_export_names_a_file_in_the_export_dir() {
    let dir = TempDir::new().unwrap();
    let (app, _state) = setup_test_app(&dir).await;
    tick(&app).await;

    let (status, exported) = send(
        &app,
        Method::POST,
        "/api/v1/alerts/export",
        Some(json!({ "path": "nightly.json" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let expected = dir.path().join("nightly.json");
    assert_eq!(exported["path"], json!(expected));
    assert!(expected.exists());

    let (status, loaded) = send(
        &app,
        Method::POST,
        "/api/v1/alerts/load",
        Some(json!({ "path": "nightly.json" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(loaded["alerts"], 2);
}

#[tokio::test]
async fn test_export_and_load_reject_paths_outside_export_dir() {
    let dir = TempDir::new().unwrap();
    let outside = TempDir::new().unwrap();
    let (app, _state) = setup_test_app(&dir).await;
    tick(&app).await;

    let target = outside.path().join("nested").join("owned.json");
    let rejected = [
        json!({ "path": target }),
        json!({ "path": "../owned.json" }),
        json!({ "path": "sub/owned.json" }),
        json!({ "path": "." }),
    ];

    for body in rejected {
        for uri in ["/api/v1/alerts/export", "/api/v1/alerts/load"] {
            let (status, reply) = send(&app, Method::POST, uri, Some(body.clone())).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{uri} {body}");
            assert!(reply["error"].as_str().is_some());
        }
    }

    assert!(!outside.path().join("nested").exists());
    assert!(!dir.path().join("sub").exists());
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);

    // Nothing was loaded
    let (_, all) = send(&app, Method::GET, "/api/v1/alerts?all=true", None).await;
    assert_eq!(all.as_array().unwrap().len(), 2);
}
