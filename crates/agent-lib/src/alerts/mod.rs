//! Alert storage and lifecycle
//!
//! Turns anomalies into numbered alerts, tracks acknowledge/resolve status,
//! keeps a bounded history and persists everything to a JSON document.

mod store;
mod types;

pub use store::{AlertStore, MAX_HISTORY};
pub use types::{Alert, AlertExport, AlertStats, Urgency, TIMESTAMP_FORMAT};
