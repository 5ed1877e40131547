//! Threshold rule evaluation
//!
//! Evaluates metrics and state snapshots against the current threshold set.
//! Evaluation has no side effects; only the threshold set is shared state.

use parking_lot::RwLock;
use tracing::info;

use super::{Anomaly, AnomalyLevel, AnomalyType, ThresholdKey, ThresholdSet};
use crate::error::WatchResult;
use crate::models::{MetricsSnapshot, StateSnapshot};

/// Process count above which a PIDS warning is raised
pub const PIDS_WARNING_LIMIT: u64 = 100;

/// Rule engine holding the live threshold set
pub struct RuleEngine {
    thresholds: RwLock<ThresholdSet>,
}

impl RuleEngine {
    /// Create an engine with default thresholds
    pub fn new() -> Self {
        Self::with_thresholds(ThresholdSet::default())
    }

    /// Create an engine with custom thresholds
    ///
    /// The set is taken as given; use [`RuleEngine::replace_thresholds`] for
    /// validated updates.
    pub fn with_thresholds(thresholds: ThresholdSet) -> Self {
        Self {
            thresholds: RwLock::new(thresholds),
        }
    }

    /// Snapshot of the current thresholds
    pub fn thresholds(&self) -> ThresholdSet {
        *self.thresholds.read()
    }

    pub fn get_threshold(&self, key: ThresholdKey) -> f64 {
        self.thresholds.read().get(key)
    }

    /// Update one threshold. Rejected updates leave the set unchanged.
    pub fn set_threshold(&self, key: ThresholdKey, value: f64) -> WatchResult<ThresholdSet> {
        let mut thresholds = self.thresholds.write();
        let updated = thresholds.with(key, value)?;
        let previous = thresholds.get(key);
        *thresholds = updated;

        info!(
            event = "threshold_changed",
            key = %key,
            previous = previous,
            value = value,
            "Threshold updated"
        );
        Ok(updated)
    }

    /// Update one threshold by name
    pub fn set_threshold_by_name(&self, name: &str, value: f64) -> WatchResult<ThresholdSet> {
        let key: ThresholdKey = name.parse()?;
        self.set_threshold(key, value)
    }

    /// Replace the whole set after validating it
    pub fn replace_thresholds(&self, thresholds: ThresholdSet) -> WatchResult<()> {
        thresholds.validate()?;
        *self.thresholds.write() = thresholds;
        Ok(())
    }

    /// Evaluate resource metrics
    ///
    /// CPU and memory are checked against their two-tier thresholds; a value
    /// above both tiers yields only the critical anomaly. The process count
    /// is checked against [`PIDS_WARNING_LIMIT`].
    pub fn analyze_metrics(&self, metrics: &MetricsSnapshot) -> Vec<Anomaly> {
        let t = self.thresholds();
        let mut anomalies = Vec::new();

        if let Some((level, limit)) = classify(metrics.cpu_percent, t.cpu_warning, t.cpu_critical) {
            let message = match level {
                AnomalyLevel::Critical => {
                    format!("CPU usage is critical: {:.1}%", metrics.cpu_percent)
                }
                AnomalyLevel::Warning => format!("CPU usage is high: {:.1}%", metrics.cpu_percent),
            };
            anomalies.push(Anomaly::new(
                AnomalyType::Cpu,
                level,
                message,
                metrics.cpu_percent,
                limit,
            ));
        }

        if let Some((level, limit)) =
            classify(metrics.memory_percent, t.memory_warning, t.memory_critical)
        {
            let message = match level {
                AnomalyLevel::Critical => {
                    format!("Memory usage is critical: {:.1}%", metrics.memory_percent)
                }
                AnomalyLevel::Warning => {
                    format!("Memory usage is high: {:.1}%", metrics.memory_percent)
                }
            };
            anomalies.push(Anomaly::new(
                AnomalyType::Memory,
                level,
                message,
                metrics.memory_percent,
                limit,
            ));
        }

        if metrics.pids > PIDS_WARNING_LIMIT {
            anomalies.push(Anomaly::new(
                AnomalyType::Pids,
                AnomalyLevel::Warning,
                format!("High number of processes: {}", metrics.pids),
                metrics.pids as f64,
                PIDS_WARNING_LIMIT as f64,
            ));
        }

        anomalies
    }

    /// Evaluate lifecycle state
    ///
    /// Status, restart count and OOM kills are independent checks and may
    /// all fire in the same call.
    pub fn analyze_container_state(&self, state: &StateSnapshot) -> Vec<Anomaly> {
        let t = self.thresholds();
        let mut anomalies = Vec::new();

        if !state.status.is_empty() && state.status != StateSnapshot::RUNNING {
            anomalies.push(Anomaly::new(
                AnomalyType::Status,
                AnomalyLevel::Critical,
                format!("Container is not running (status: {})", state.status),
                state.status.as_str(),
                StateSnapshot::RUNNING,
            ));
        }

        let restarts = state.restart_count as f64;
        if let Some((level, limit)) = classify(restarts, t.restart_warning, t.restart_critical) {
            let message = match level {
                AnomalyLevel::Critical => format!(
                    "Container is unstable: restarted {} times",
                    state.restart_count
                ),
                AnomalyLevel::Warning => {
                    format!("Container restarted {} times", state.restart_count)
                }
            };
            anomalies.push(Anomaly::new(
                AnomalyType::Restarts,
                level,
                message,
                restarts,
                limit,
            ));
        }

        if state.oom_killed {
            anomalies.push(Anomaly::new(
                AnomalyType::Oom,
                AnomalyLevel::Critical,
                "Container was killed by the OOM killer",
                1.0,
                0.0,
            ));
        }

        anomalies
    }
}

impl Default for RuleEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Two-tier classification; critical wins when both tiers are exceeded
fn classify(value: f64, warning: f64, critical: f64) -> Option<(AnomalyLevel, f64)> {
    if value > critical {
        Some((AnomalyLevel::Critical, critical))
    } else if value > warning {
        Some((AnomalyLevel::Warning, warning))
    } else {
        None
    }
}
