pub mod alerts;
pub mod monitor;
pub mod thresholds;
