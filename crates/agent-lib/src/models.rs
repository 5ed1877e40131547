//! Core data models for the watch agent

use serde::{Deserialize, Serialize};

/// Resource usage sampled from one unit during a tick
///
/// Absent fields deserialize to zero so partial samples never fail analysis.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsSnapshot {
    pub cpu_percent: f64,
    pub memory_percent: f64,
    pub pids: u64,
}

/// Lifecycle state sampled from one unit during a tick
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StateSnapshot {
    /// Runtime status; compared against `"running"`. Empty means unknown.
    pub status: String,
    pub restart_count: u64,
    pub oom_killed: bool,
}

impl StateSnapshot {
    pub const RUNNING: &'static str = "running";
}

/// A monitored unit as reported by the unit source
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UnitInfo {
    /// Stable identifier used to fetch snapshots
    pub id: String,
    /// Display name attached to alerts
    pub name: String,
}

impl UnitInfo {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}
