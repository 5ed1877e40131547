//! Alert records, statistics and the export document

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::rules::{Anomaly, AnomalyLevel, ThresholdSet};

/// Display format for alert timestamps
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub(crate) fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

/// Urgency derived from the anomaly level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Urgency {
    High,
    Medium,
}

impl Urgency {
    pub fn from_level(level: AnomalyLevel) -> Self {
        match level {
            AnomalyLevel::Critical => Urgency::High,
            AnomalyLevel::Warning => Urgency::Medium,
        }
    }

    /// Sort priority, 1 being the most urgent
    pub fn priority(&self) -> u8 {
        match self {
            Urgency::High => 1,
            Urgency::Medium => 2,
        }
    }
}

impl std::fmt::Display for Urgency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Urgency::High => write!(f, "HIGH"),
            Urgency::Medium => write!(f, "MEDIUM"),
        }
    }
}

/// A lifecycle-tracked wrapper around one anomaly
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: u64,
    pub unit_name: String,
    pub anomaly: Anomaly,
    /// Creation time, formatted with [`TIMESTAMP_FORMAT`]
    pub timestamp: String,
    pub urgency: Urgency,
    pub priority: u8,
    pub acknowledged: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acknowledged_at: Option<String>,
    pub resolved: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<String>,
    /// One-line summary for operators
    pub notification: String,
}

impl Alert {
    pub(crate) fn new(id: u64, anomaly: &Anomaly, unit_name: &str) -> Self {
        let urgency = Urgency::from_level(anomaly.level);
        Self {
            id,
            unit_name: unit_name.to_string(),
            notification: format!(
                "[{}] {}: {} (threshold {})",
                anomaly.level, unit_name, anomaly.message, anomaly.threshold
            ),
            anomaly: anomaly.clone(),
            timestamp: format_timestamp(Utc::now()),
            urgency,
            priority: urgency.priority(),
            acknowledged: false,
            acknowledged_at: None,
            resolved: false,
            resolved_at: None,
        }
    }

    pub fn is_critical(&self) -> bool {
        self.anomaly.level == AnomalyLevel::Critical
    }

    pub(crate) fn acknowledge(&mut self, at: &str) {
        self.acknowledged = true;
        self.acknowledged_at = Some(at.to_string());
    }

    pub(crate) fn resolve(&mut self, at: &str) {
        self.resolved = true;
        self.resolved_at = Some(at.to_string());
    }
}

/// Aggregate counts over the active alert list
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertStats {
    pub total: usize,
    pub critical: usize,
    pub warning: usize,
    pub acknowledged: usize,
    pub resolved: usize,
    pub unacknowledged: usize,
    /// Alerts not yet resolved
    pub active: usize,
}

impl AlertStats {
    pub fn from_alerts<'a>(alerts: impl IntoIterator<Item = &'a Alert>) -> Self {
        let mut stats = AlertStats::default();
        for alert in alerts {
            stats.total += 1;
            match alert.anomaly.level {
                AnomalyLevel::Critical => stats.critical += 1,
                AnomalyLevel::Warning => stats.warning += 1,
            }
            if alert.acknowledged {
                stats.acknowledged += 1;
            }
            if alert.resolved {
                stats.resolved += 1;
            } else {
                stats.active += 1;
            }
        }
        stats.unacknowledged = stats.total - stats.acknowledged;
        stats
    }
}

/// Flat-file export document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertExport {
    /// RFC 3339 export time
    pub exported_at: String,
    pub alerts: Vec<Alert>,
    pub history: Vec<Alert>,
    pub stats: AlertStats,
    pub thresholds: ThresholdSet,
    /// Next id the exporting store would have assigned
    #[serde(default)]
    pub next_id: u64,
}
