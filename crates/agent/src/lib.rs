//! Fleet watch agent
//!
//! Hosts the monitor behind an HTTP control API and exposes health and
//! Prometheus metrics.

pub mod api;
pub mod config;
