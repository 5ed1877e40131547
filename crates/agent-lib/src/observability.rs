//! Observability infrastructure for the watch agent
//!
//! Provides:
//! - Prometheus metrics (tick latency, units monitored, anomalies, errors, active alerts)
//! - Structured JSON logging with tracing

use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, register_int_gauge,
    Histogram, IntCounter, IntCounterVec, IntGauge,
};
use std::sync::OnceLock;
use tracing::{info, warn};

use crate::alerts::Alert;
use crate::rules::AnomalyLevel;

/// Histogram buckets for tick latency (in seconds)
const TICK_LATENCY_BUCKETS: &[f64] = &[
    0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<WatchMetricsInner> = OnceLock::new();

struct WatchMetricsInner {
    tick_latency_seconds: Histogram,
    ticks: IntCounter,
    units_monitored: IntGauge,
    anomalies: IntCounterVec,
    unit_errors: IntCounter,
    enumeration_errors: IntCounter,
    alerts_active: IntGauge,
}

impl WatchMetricsInner {
    fn new() -> Self {
        Self {
            tick_latency_seconds: register_histogram!(
                "fleetwatch_tick_latency_seconds",
                "Time spent checking every unit in one monitor tick",
                TICK_LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register tick_latency_seconds"),

            ticks: register_int_counter!(
                "fleetwatch_ticks_total",
                "Number of completed monitor ticks"
            )
            .expect("Failed to register ticks_total"),

            units_monitored: register_int_gauge!(
                "fleetwatch_units_monitored",
                "Number of units seen in the last tick"
            )
            .expect("Failed to register units_monitored"),

            anomalies: register_int_counter_vec!(
                "fleetwatch_anomalies_total",
                "Anomalies detected, by type and level",
                &["type", "level"]
            )
            .expect("Failed to register anomalies_total"),

            unit_errors: register_int_counter!(
                "fleetwatch_unit_errors_total",
                "Units skipped because a snapshot could not be fetched"
            )
            .expect("Failed to register unit_errors_total"),

            enumeration_errors: register_int_counter!(
                "fleetwatch_enumeration_errors_total",
                "Ticks aborted because units could not be listed"
            )
            .expect("Failed to register enumeration_errors_total"),

            alerts_active: register_int_gauge!(
                "fleetwatch_alerts_active",
                "Alerts in the active list"
            )
            .expect("Failed to register alerts_active"),
        }
    }
}

/// Watch metrics for Prometheus exposition
///
/// A lightweight handle to the global metrics instance; clones share the
/// same underlying metrics.
#[derive(Clone)]
pub struct WatchMetrics {
    _private: (),
}

impl Default for WatchMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl WatchMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(WatchMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &WatchMetricsInner {
        GLOBAL_METRICS.get_or_init(WatchMetricsInner::new)
    }

    /// Record a completed tick
    pub fn observe_tick(&self, duration_secs: f64, units: usize) {
        let inner = self.inner();
        inner.tick_latency_seconds.observe(duration_secs);
        inner.ticks.inc();
        inner.units_monitored.set(units as i64);
    }

    pub fn inc_anomaly(&self, anomaly_type: &str, level: &str) {
        self.inner()
            .anomalies
            .with_label_values(&[anomaly_type, level])
            .inc();
    }

    pub fn inc_unit_errors(&self) {
        self.inner().unit_errors.inc();
    }

    pub fn inc_enumeration_errors(&self) {
        self.inner().enumeration_errors.inc();
    }

    pub fn set_alerts_active(&self, count: usize) {
        self.inner().alerts_active.set(count as i64);
    }
}

/// Structured logger for watch events
#[derive(Clone)]
pub struct StructuredLogger {
    node_name: String,
}

impl StructuredLogger {
    pub fn new(node_name: impl Into<String>) -> Self {
        Self {
            node_name: node_name.into(),
        }
    }

    /// Log a newly generated alert; critical alerts log at warn
    pub fn log_alert(&self, alert: &Alert) {
        match alert.anomaly.level {
            AnomalyLevel::Critical => {
                warn!(
                    event = "alert_generated",
                    node = %self.node_name,
                    alert_id = alert.id,
                    unit = %alert.unit_name,
                    anomaly_type = %alert.anomaly.anomaly_type,
                    level = %alert.anomaly.level,
                    urgency = %alert.urgency,
                    details = %alert.anomaly.message,
                    "Critical alert"
                );
            }
            AnomalyLevel::Warning => {
                info!(
                    event = "alert_generated",
                    node = %self.node_name,
                    alert_id = alert.id,
                    unit = %alert.unit_name,
                    anomaly_type = %alert.anomaly.anomaly_type,
                    level = %alert.anomaly.level,
                    urgency = %alert.urgency,
                    details = %alert.anomaly.message,
                    "Warning alert"
                );
            }
        }
    }

    /// Log a unit skipped for the current tick
    pub fn log_unit_failure(&self, unit: &str, error: &dyn std::fmt::Display) {
        warn!(
            event = "unit_check_failed",
            node = %self.node_name,
            unit = %unit,
            error = %error,
            "Skipping unit for this tick"
        );
    }

    pub fn log_monitor_state(&self, running: bool, interval_secs: u64) {
        info!(
            event = if running { "monitor_started" } else { "monitor_stopped" },
            node = %self.node_name,
            interval_secs = interval_secs,
            "Monitor state changed"
        );
    }

    pub fn log_startup(&self, version: &str) {
        info!(
            event = "agent_started",
            node = %self.node_name,
            agent_version = %version,
            "Watch agent started"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "agent_shutdown",
            node = %self.node_name,
            reason = %reason,
            "Watch agent shutting down"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Value of a counter family, restricted to metrics carrying `labels`
    fn counter_value(name: &str, labels: &[(&str, &str)]) -> f64 {
        prometheus::gather()
            .iter()
            .filter(|family| family.get_name() == name)
            .flat_map(|family| family.get_metric())
            .filter(|metric| {
                labels.iter().all(|(key, value)| {
                    metric
                        .get_label()
                        .iter()
                        .any(|pair| pair.get_name() == *key && pair.get_value() == *value)
                })
            })
            .map(|metric| metric.get_counter().get_value())
            .sum()
    }

    fn is_registered(name: &str) -> bool {
        prometheus::gather()
            .iter()
            .any(|family| family.get_name() == name)
    }

    #[test]
    fn test_watch_metrics_creation() {
        let metrics = WatchMetrics::new();
        // Metrics are process-global and other tests tick concurrently, so
        // shared series are checked as lower bounds.
        let ticks_before = counter_value("fleetwatch_ticks_total", &[]);
        let unit_errors_before = counter_value("fleetwatch_unit_errors_total", &[]);
        let enumeration_before = counter_value("fleetwatch_enumeration_errors_total", &[]);

        metrics.observe_tick(0.01, 3);
        metrics.inc_anomaly("METRICS_TEST", "WARNING");
        metrics.inc_unit_errors();
        metrics.inc_enumeration_errors();
        metrics.set_alerts_active(4);

        // A second handle shares the registration
        let other = WatchMetrics::new();
        other.inc_anomaly("METRICS_TEST", "WARNING");

        let labels = [("type", "METRICS_TEST"), ("level", "WARNING")];
        assert_eq!(counter_value("fleetwatch_anomalies_total", &labels), 2.0);
        assert!(counter_value("fleetwatch_ticks_total", &[]) >= ticks_before + 1.0);
        assert!(counter_value("fleetwatch_unit_errors_total", &[]) >= unit_errors_before + 1.0);
        assert!(
            counter_value("fleetwatch_enumeration_errors_total", &[]) >= enumeration_before + 1.0
        );

        for name in [
            "fleetwatch_tick_latency_seconds",
            "fleetwatch_units_monitored",
            "fleetwatch_alerts_active",
        ] {
            assert!(is_registered(name), "{name} not registered");
        }
    }

    #[test]
    fn test_structured_logger_creation() {
        let logger = StructuredLogger::new("test-node");
        assert_eq!(logger.node_name, "test-node");
    }
}
