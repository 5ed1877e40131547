//! Builder for assembling a [`Monitor`] from its collaborators

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use super::{Monitor, MonitorConfig};
use crate::alerts::AlertStore;
use crate::collector::UnitSource;
use crate::health::HealthRegistry;
use crate::observability::{StructuredLogger, WatchMetrics};
use crate::rules::RuleEngine;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MonitorBuildError {
    #[error("monitor requires a unit source")]
    MissingSource,
    #[error("monitor requires a rule engine")]
    MissingEngine,
    #[error("monitor requires an alert store")]
    MissingStore,
    #[error("{0} must be greater than zero")]
    ZeroDuration(&'static str),
}

/// Builder for [`Monitor`]
///
/// ```no_run
/// # use std::sync::Arc;
/// # use std::time::Duration;
/// # use fleetwatch_lib::{AlertStore, MonitorBuilder, RuleEngine, UnitSource};
/// # fn example(source: Arc<dyn UnitSource>) -> Result<(), Box<dyn std::error::Error>> {
/// let monitor = MonitorBuilder::new()
///     .source(source)
///     .engine(Arc::new(RuleEngine::new()))
///     .store(Arc::new(AlertStore::new()))
///     .interval(Duration::from_secs(10))
///     .build()?;
/// # Ok(())
/// # }
/// ```
#[derive(Default)]
pub struct MonitorBuilder {
    source: Option<Arc<dyn UnitSource>>,
    engine: Option<Arc<RuleEngine>>,
    store: Option<Arc<AlertStore>>,
    config: MonitorConfig,
    health: Option<HealthRegistry>,
    metrics: Option<WatchMetrics>,
    logger: Option<StructuredLogger>,
}

impl MonitorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn source(mut self, source: Arc<dyn UnitSource>) -> Self {
        self.source = Some(source);
        self
    }

    pub fn engine(mut self, engine: Arc<RuleEngine>) -> Self {
        self.engine = Some(engine);
        self
    }

    pub fn store(mut self, store: Arc<AlertStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn config(mut self, config: MonitorConfig) -> Self {
        self.config = config;
        self
    }

    /// Wait between ticks
    pub fn interval(mut self, interval: Duration) -> Self {
        self.config.interval = interval;
        self
    }

    /// Wait after a failed unit enumeration
    pub fn error_backoff(mut self, backoff: Duration) -> Self {
        self.config.error_backoff = backoff;
        self
    }

    /// Bound on how long `stop` waits for the loop
    pub fn stop_grace(mut self, grace: Duration) -> Self {
        self.config.stop_grace = grace;
        self
    }

    pub fn health(mut self, health: HealthRegistry) -> Self {
        self.health = Some(health);
        self
    }

    pub fn metrics(mut self, metrics: WatchMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn logger(mut self, logger: StructuredLogger) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn build(self) -> Result<Monitor, MonitorBuildError> {
        let source = self.source.ok_or(MonitorBuildError::MissingSource)?;
        let engine = self.engine.ok_or(MonitorBuildError::MissingEngine)?;
        let store = self.store.ok_or(MonitorBuildError::MissingStore)?;

        if self.config.interval.is_zero() {
            return Err(MonitorBuildError::ZeroDuration("interval"));
        }
        if self.config.error_backoff.is_zero() {
            return Err(MonitorBuildError::ZeroDuration("error_backoff"));
        }

        Ok(Monitor::from_parts(
            source,
            engine,
            store,
            self.config,
            self.health,
            self.metrics,
            self.logger.unwrap_or_else(|| StructuredLogger::new("local")),
        ))
    }
}
