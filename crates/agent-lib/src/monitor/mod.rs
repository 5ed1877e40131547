//! Background monitor
//!
//! Polls every unit of a [`UnitSource`] on a fixed interval, runs both rule
//! sets over the snapshots and turns each anomaly into an alert. The loop
//! runs on one tokio task and is stopped through a broadcast channel with a
//! bounded join.

mod builder;


pub use builder::{MonitorBuildError, MonitorBuilder};

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::alerts::{Alert, AlertStore};
use crate::collector::UnitSource;
use crate::error::WatchError;
use crate::health::{components, HealthRegistry};
use crate::models::UnitInfo;
use crate::observability::{StructuredLogger, WatchMetrics};
use crate::rules::{Anomaly, RuleEngine};

/// Timing for the poll loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorConfig {
    /// Wait between ticks (default: 30 seconds)
    pub interval: Duration,
    /// Wait after a failed unit enumeration (default: 5 seconds)
    pub error_backoff: Duration,
    /// Bound on how long `stop` waits for the loop (default: 5 seconds)
    pub stop_grace: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            error_backoff: Duration::from_secs(5),
            stop_grace: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MonitorState {
    Idle,
    Running,
}

impl MonitorState {
    pub fn as_str(&self) -> &'static str {
        match self {
            MonitorState::Idle => "idle",
            MonitorState::Running => "running",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StartOutcome {
    Started,
    AlreadyRunning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopOutcome {
    /// The loop exited within the grace period
    Stopped,
    /// The loop overran the grace period and was aborted
    Detached,
    NotRunning,
}

/// Result of one pass over the fleet
#[derive(Debug, Clone, Default)]
pub struct TickReport {
    pub units_checked: usize,
    pub units_failed: usize,
    pub alerts: Vec<Alert>,
}

struct RunningTask {
    shutdown: broadcast::Sender<()>,
    handle: JoinHandle<()>,
}

enum TaskSlot {
    Idle,
    Running(RunningTask),
    /// A `stop` call owns the task and is waiting for it to exit
    Stopping,
}

/// Hands the slot back as idle once the stop finishes or is cancelled.
/// A loop still alive at that point is aborted.
struct PendingStop<'a> {
    slot: &'a Mutex<TaskSlot>,
    handle: JoinHandle<()>,
}

impl Drop for PendingStop<'_> {
    fn drop(&mut self) {
        if !self.handle.is_finished() {
            self.handle.abort();
        }
        *self.slot.lock() = TaskSlot::Idle;
    }
}

/// State shared between the handle and the loop task
struct MonitorInner {
    source: Arc<dyn UnitSource>,
    engine: Arc<RuleEngine>,
    store: Arc<AlertStore>,
    config: MonitorConfig,
    health: Option<HealthRegistry>,
    metrics: Option<WatchMetrics>,
    logger: StructuredLogger,
}

/// Handle controlling the background poll loop
pub struct Monitor {
    inner: Arc<MonitorInner>,
    task: Mutex<TaskSlot>,
}

impl Monitor {
    pub fn builder() -> MonitorBuilder {
        MonitorBuilder::new()
    }

    fn from_parts(
        source: Arc<dyn UnitSource>,
        engine: Arc<RuleEngine>,
        store: Arc<AlertStore>,
        config: MonitorConfig,
        health: Option<HealthRegistry>,
        metrics: Option<WatchMetrics>,
        logger: StructuredLogger,
    ) -> Self {
        Self {
            inner: Arc::new(MonitorInner {
                source,
                engine,
                store,
                config,
                health,
                metrics,
                logger,
            }),
            task: Mutex::new(TaskSlot::Idle),
        }
    }

    pub fn config(&self) -> MonitorConfig {
        self.inner.config
    }

    pub fn engine(&self) -> &Arc<RuleEngine> {
        &self.inner.engine
    }

    pub fn store(&self) -> &Arc<AlertStore> {
        &self.inner.store
    }

    pub fn state(&self) -> MonitorState {
        match &*self.task.lock() {
            TaskSlot::Running(task) if !task.handle.is_finished() => MonitorState::Running,
            TaskSlot::Stopping => MonitorState::Running,
            _ => MonitorState::Idle,
        }
    }

    pub fn is_running(&self) -> bool {
        self.state() == MonitorState::Running
    }

    /// Spawn the poll loop. Must be called from within a tokio runtime.
    ///
    /// A loop that is still shutting down counts as running.
    pub fn start(&self) -> StartOutcome {
        let mut task = self.task.lock();
        let busy = match &*task {
            TaskSlot::Running(t) => !t.handle.is_finished(),
            TaskSlot::Stopping => true,
            TaskSlot::Idle => false,
        };
        if busy {
            return StartOutcome::AlreadyRunning;
        }

        let (shutdown, rx) = broadcast::channel(1);
        let inner = Arc::clone(&self.inner);
        let handle = tokio::spawn(async move { inner.run(rx).await });
        *task = TaskSlot::Running(RunningTask { shutdown, handle });

        self.inner
            .logger
            .log_monitor_state(true, self.inner.config.interval.as_secs());
        StartOutcome::Started
    }

    /// Signal the loop and wait up to the stop grace for it to exit.
    ///
    /// The monitor reports `Running` until the loop has exited or been
    /// aborted. A second `stop` while one is pending returns `NotRunning`.
    pub async fn stop(&self) -> StopOutcome {
        let RunningTask { shutdown, handle } = {
            let mut slot = self.task.lock();
            match std::mem::replace(&mut *slot, TaskSlot::Stopping) {
                TaskSlot::Running(task) if !task.handle.is_finished() => task,
                TaskSlot::Stopping => return StopOutcome::NotRunning,
                _ => {
                    *slot = TaskSlot::Idle;
                    return StopOutcome::NotRunning;
                }
            }
        };
        let mut pending = PendingStop {
            slot: &self.task,
            handle,
        };

        // The loop may be between ticks or inside one; either way it
        // observes the signal at its next select.
        let _ = shutdown.send(());

        let grace = self.inner.config.stop_grace;
        let outcome = match tokio::time::timeout(grace, &mut pending.handle).await {
            Ok(Ok(())) => StopOutcome::Stopped,
            Ok(Err(e)) => {
                warn!(error = %e, "Monitor task ended abnormally");
                StopOutcome::Stopped
            }
            Err(_) => {
                warn!(
                    grace_secs = grace.as_secs_f64(),
                    "Monitor did not stop within grace period, detaching"
                );
                StopOutcome::Detached
            }
        };

        if let Some(health) = &self.inner.health {
            health.set_degraded(components::MONITOR, "monitor stopped").await;
        }
        self.inner
            .logger
            .log_monitor_state(false, self.inner.config.interval.as_secs());

        // Aborts a detached loop and frees the slot for the next start
        drop(pending);
        outcome
    }

    /// Run a single tick on the caller's task
    pub async fn run_once(&self) -> Result<TickReport> {
        self.inner.tick().await
    }
}

impl MonitorInner {
    async fn run(&self, mut shutdown: broadcast::Receiver<()>) {
        info!(
            interval_secs = self.config.interval.as_secs(),
            "Starting monitor loop"
        );
        if let Some(health) = &self.health {
            health.set_healthy(components::MONITOR).await;
        }

        loop {
            let wait = match self.tick().await {
                Ok(report) => {
                    debug!(
                        units = report.units_checked,
                        failed = report.units_failed,
                        alerts = report.alerts.len(),
                        "Tick complete"
                    );
                    self.config.interval
                }
                Err(e) => {
                    warn!(
                        error = %e,
                        backoff_secs = self.config.error_backoff.as_secs_f64(),
                        "Unit enumeration failed"
                    );
                    self.config.error_backoff
                }
            };

            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                _ = shutdown.recv() => {
                    info!("Shutting down monitor loop");
                    break;
                }
            }
        }
    }

    /// One pass over every unit. Fails only when units cannot be listed.
    async fn tick(&self) -> Result<TickReport> {
        let started = Instant::now();

        let units = match self.source.list_units().await.context("listing units") {
            Ok(units) => units,
            Err(e) => {
                if let Some(metrics) = &self.metrics {
                    metrics.inc_enumeration_errors();
                }
                if let Some(health) = &self.health {
                    health
                        .set_degraded(components::UNIT_SOURCE, format!("{e:#}"))
                        .await;
                }
                return Err(e);
            }
        };

        let mut report = TickReport::default();
        for unit in &units {
            match self.check_unit(unit, &mut report.alerts).await {
                Ok(()) => report.units_checked += 1,
                Err(e) => {
                    report.units_failed += 1;
                    self.logger.log_unit_failure(&unit.name, &e);
                    if let Some(metrics) = &self.metrics {
                        metrics.inc_unit_errors();
                    }
                }
            }
        }

        if let Some(health) = &self.health {
            health.set_healthy(components::UNIT_SOURCE).await;
        }
        if let Some(metrics) = &self.metrics {
            metrics.observe_tick(started.elapsed().as_secs_f64(), units.len());
            metrics.set_alerts_active(self.store.active_len());
        }

        Ok(report)
    }

    async fn check_unit(
        &self,
        unit: &UnitInfo,
        alerts: &mut Vec<Alert>,
    ) -> Result<(), WatchError> {
        let unavailable = |source: anyhow::Error| WatchError::CollaboratorUnavailable {
            unit: unit.name.clone(),
            source,
        };

        let metrics = self.source.fetch_metrics(unit).await.map_err(unavailable)?;
        for anomaly in self.engine.analyze_metrics(&metrics) {
            alerts.push(self.raise(&anomaly, unit));
        }

        let state = self.source.fetch_state(unit).await.map_err(unavailable)?;
        for anomaly in self.engine.analyze_container_state(&state) {
            alerts.push(self.raise(&anomaly, unit));
        }

        Ok(())
    }

    fn raise(&self, anomaly: &Anomaly, unit: &UnitInfo) -> Alert {
        let alert = self.store.generate_alert(anomaly, &unit.name);
        self.logger.log_alert(&alert);
        if let Some(metrics) = &self.metrics {
            metrics.inc_anomaly(anomaly.anomaly_type.as_str(), anomaly.level.as_str());
        }
        alert
    }
}
