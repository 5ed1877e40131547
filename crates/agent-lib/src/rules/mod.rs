//! Rule-based anomaly classification
//!
//! This module provides:
//! - Typed threshold names and the threshold set
//! - Two-tier metric rules (CPU, memory) and the fixed process-count rule
//! - State rules (status, restarts, OOM kills)

mod anomaly;
mod engine;
mod thresholds;

pub use anomaly::{Anomaly, AnomalyLevel, AnomalyType, AnomalyValue};
pub use engine::{RuleEngine, PIDS_WARNING_LIMIT};
pub use thresholds::{ThresholdKey, ThresholdSet};
