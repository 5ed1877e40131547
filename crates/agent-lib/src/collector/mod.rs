//! Unit sources
//!
//! The monitor reads the fleet through the [`UnitSource`] trait. The cgroup
//! v2 implementation samples resource usage and lifecycle state straight
//! from the unified hierarchy.

mod cgroup_v2;

#[cfg(test)]
mod tests;

pub use cgroup_v2::CgroupV2Source;

use crate::models::{MetricsSnapshot, StateSnapshot, UnitInfo};
use anyhow::Result;
use std::path::Path;
use std::sync::Arc;

pub use async_trait::async_trait;

/// Source of monitored units and their snapshots
#[async_trait]
pub trait UnitSource: Send + Sync {
    /// List the units currently present
    async fn list_units(&self) -> Result<Vec<UnitInfo>>;

    /// Sample resource usage for one unit
    async fn fetch_metrics(&self, unit: &UnitInfo) -> Result<MetricsSnapshot>;

    /// Sample lifecycle state for one unit
    async fn fetch_state(&self, unit: &UnitInfo) -> Result<StateSnapshot>;
}

/// Create a source for the hierarchy mounted at `cgroup_root`
pub async fn create_source(cgroup_root: &Path, proc_root: &Path) -> Result<Arc<dyn UnitSource>> {
    let source = CgroupV2Source::with_proc_path(cgroup_root, proc_root);

    if !source.is_available().await {
        anyhow::bail!(
            "{} is not a cgroup v2 hierarchy (missing cgroup.controllers)",
            cgroup_root.display()
        );
    }

    tracing::info!(root = %cgroup_root.display(), "Using cgroup v2 unit source");
    Ok(Arc::new(source))
}
