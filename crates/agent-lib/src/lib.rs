//! Core library for the fleet watch agent
//!
//! This crate provides:
//! - Threshold rules turning unit snapshots into anomalies
//! - An alert store with acknowledge/resolve lifecycle and JSON persistence
//! - A background monitor polling a pluggable unit source
//! - A cgroup v2 unit source
//! - Health checks and observability

pub mod alerts;
pub mod collector;
pub mod error;
pub mod health;
pub mod models;
pub mod monitor;
pub mod observability;
pub mod rules;

pub use alerts::{Alert, AlertExport, AlertStats, AlertStore, Urgency, MAX_HISTORY};
pub use collector::{create_source, CgroupV2Source, UnitSource};
pub use error::{PersistenceSource, WatchError, WatchResult};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use models::*;
pub use monitor::{
    Monitor, MonitorBuildError, MonitorBuilder, MonitorConfig, MonitorState, StartOutcome,
    StopOutcome, TickReport,
};
pub use observability::{StructuredLogger, WatchMetrics};
pub use rules::{
    Anomaly, AnomalyLevel, AnomalyType, AnomalyValue, RuleEngine, ThresholdKey, ThresholdSet,
};
