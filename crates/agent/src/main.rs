//! FleetWatch agent
//!
//! Runs on each host, polling the cgroup v2 hierarchy for container
//! anomalies and serving the alert control API.

use anyhow::{Context, Result};
use fleetwatch_agent::{api, config};
use fleetwatch_lib::{
    create_source,
    health::{components, HealthRegistry},
    AlertStore, MonitorBuilder, RuleEngine, StartOutcome, StructuredLogger, WatchMetrics,
};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const AGENT_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    let config = config::AgentConfig::load()?;
    info!(node_name = %config.node_name, port = config.api_port, "Agent configured");

    let logger = StructuredLogger::new(&config.node_name);
    logger.log_startup(AGENT_VERSION);

    let health_registry = HealthRegistry::for_agent().await;
    let metrics = WatchMetrics::new();

    let engine = Arc::new(RuleEngine::new());
    engine
        .replace_thresholds(config.thresholds())
        .context("invalid threshold overrides in configuration")?;

    let source = create_source(&config.cgroup_root, &config.proc_root).await?;

    let monitor = MonitorBuilder::new()
        .source(source)
        .engine(engine)
        .store(Arc::new(AlertStore::new()))
        .config(config.monitor_config())
        .health(health_registry.clone())
        .metrics(metrics.clone())
        .logger(logger.clone())
        .build()?;

    if config.autostart {
        if monitor.start() == StartOutcome::Started {
            info!(interval_secs = config.check_interval_secs, "Monitor started");
        }
    } else {
        health_registry
            .set_degraded(components::MONITOR, "monitor not started")
            .await;
    }

    let app_state = Arc::new(api::AppState::new(
        health_registry.clone(),
        metrics,
        monitor,
        config.export_path.clone(),
    ));

    health_registry.set_ready(true).await;

    let api_handle = tokio::spawn(api::serve(config.api_port, app_state.clone()));

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result?;
            logger.log_shutdown("SIGINT received");
        }
        result = api_handle => {
            match result {
                Ok(Ok(())) => logger.log_shutdown("API server exited"),
                Ok(Err(e)) => error!(error = %e, "API server failed"),
                Err(e) => error!(error = %e, "API server task panicked"),
            }
        }
    }

    health_registry.set_ready(false).await;
    let outcome = app_state.monitor.stop().await;
    info!(outcome = ?outcome, "Shutting down");

    Ok(())
}
