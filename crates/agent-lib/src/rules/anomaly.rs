//! Anomaly records produced by the rule engine

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which rule produced an anomaly
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AnomalyType {
    Cpu,
    Memory,
    Pids,
    Status,
    Restarts,
    Oom,
}

impl AnomalyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnomalyType::Cpu => "CPU",
            AnomalyType::Memory => "MEMORY",
            AnomalyType::Pids => "PIDS",
            AnomalyType::Status => "STATUS",
            AnomalyType::Restarts => "RESTARTS",
            AnomalyType::Oom => "OOM",
        }
    }
}

impl std::fmt::Display for AnomalyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Severity of an anomaly
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AnomalyLevel {
    Warning,
    Critical,
}

impl AnomalyLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnomalyLevel::Warning => "WARNING",
            AnomalyLevel::Critical => "CRITICAL",
        }
    }
}

impl std::fmt::Display for AnomalyLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Observed or expected value attached to an anomaly
///
/// Metric rules carry numbers; the status rule carries the observed and
/// expected status text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnomalyValue {
    Number(f64),
    Text(String),
}

impl std::fmt::Display for AnomalyValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AnomalyValue::Number(n) => write!(f, "{}", n),
            AnomalyValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<f64> for AnomalyValue {
    fn from(value: f64) -> Self {
        AnomalyValue::Number(value)
    }
}

impl From<&str> for AnomalyValue {
    fn from(value: &str) -> Self {
        AnomalyValue::Text(value.to_string())
    }
}

/// A single rule finding about one metric or state condition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Anomaly {
    #[serde(rename = "type")]
    pub anomaly_type: AnomalyType,
    pub level: AnomalyLevel,
    pub message: String,
    pub value: AnomalyValue,
    /// Threshold that was exceeded, or the expected value for state rules
    pub threshold: AnomalyValue,
    pub timestamp: DateTime<Utc>,
}

impl Anomaly {
    pub fn new(
        anomaly_type: AnomalyType,
        level: AnomalyLevel,
        message: impl Into<String>,
        value: impl Into<AnomalyValue>,
        threshold: impl Into<AnomalyValue>,
    ) -> Self {
        Self {
            anomaly_type,
            level,
            message: message.into(),
            value: value.into(),
            threshold: threshold.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn is_critical(&self) -> bool {
        self.level == AnomalyLevel::Critical
    }
}
