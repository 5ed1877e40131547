//! cgroup v2 unit source
//!
//! Reads snapshots from the unified cgroup v2 hierarchy:
//! - cpu.stat for CPU usage (percent derived from deltas between fetches)
//! - memory.current / memory.max for memory usage
//! - pids.current for the process count
//! - cgroup.procs, cgroup.freeze and memory.events for lifecycle state

use super::UnitSource;
use crate::models::{MetricsSnapshot, StateSnapshot, UnitInfo};
use anyhow::{Context, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio::fs;
use tracing::debug;

/// Length of the short id used as the unit display name
const SHORT_ID_LEN: usize = 12;

/// Scope prefixes used by common container runtimes
const SCOPE_PREFIXES: &[&str] = &["docker-", "crio-", "cri-containerd-", "libpod-"];

/// Last CPU reading for a unit
#[derive(Debug, Clone, Copy)]
struct CpuSample {
    usage_usec: u64,
    at: Instant,
}

/// Unit source backed by the cgroup v2 unified hierarchy
pub struct CgroupV2Source {
    cgroup_root: PathBuf,
    proc_path: PathBuf,
    cpu_samples: Mutex<HashMap<String, CpuSample>>,
}

impl CgroupV2Source {
    /// Create a source reading host memory from `/proc`
    pub fn new(cgroup_root: impl Into<PathBuf>) -> Self {
        Self::with_proc_path(cgroup_root, "/proc")
    }

    /// Create a source with custom proc path (for testing)
    pub fn with_proc_path(
        cgroup_root: impl Into<PathBuf>,
        proc_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            cgroup_root: cgroup_root.into(),
            proc_path: proc_path.into(),
            cpu_samples: Mutex::new(HashMap::new()),
        }
    }

    /// Check if cgroup v2 is mounted at the root
    pub async fn is_available(&self) -> bool {
        fs::metadata(self.cgroup_root.join("cgroup.controllers"))
            .await
            .is_ok()
    }

    /// Parse cpu.stat contents, returning usage_usec
    pub fn parse_cpu_stat(content: &str) -> u64 {
        Self::parse_keyed(content)
            .get("usage_usec")
            .copied()
            .unwrap_or(0)
    }

    /// Parse flat keyed files such as memory.stat or memory.events
    pub fn parse_keyed(content: &str) -> HashMap<String, u64> {
        let mut stats = HashMap::new();

        for line in content.lines() {
            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.len() >= 2 {
                if let Ok(value) = parts[1].parse::<u64>() {
                    stats.insert(parts[0].to_string(), value);
                }
            }
        }

        stats
    }

    /// Parse a limit file; `max` means unlimited
    pub fn parse_limit(content: &str) -> Option<u64> {
        match content.trim() {
            "max" | "" => None,
            value => value.parse().ok(),
        }
    }

    /// Parse MemTotal from /proc/meminfo, in bytes
    pub fn parse_mem_total(content: &str) -> Option<u64> {
        content
            .lines()
            .find(|line| line.starts_with("MemTotal:"))
            .and_then(|line| line.split_whitespace().nth(1))
            .and_then(|kb| kb.parse::<u64>().ok())
            .map(|kb| kb * 1024)
    }

    /// CPU percent between two cumulative readings
    pub fn cpu_percent_between(prev_usec: u64, usage_usec: u64, elapsed: Duration) -> f64 {
        let elapsed_usec = elapsed.as_micros() as f64;
        if elapsed_usec <= 0.0 || usage_usec < prev_usec {
            return 0.0;
        }
        (usage_usec - prev_usec) as f64 / elapsed_usec * 100.0
    }

    /// Extract a container id from a cgroup directory name
    ///
    /// Handles plain 64-char hex ids and runtime scopes such as
    /// `docker-<id>.scope` or `crio-<id>.scope`.
    pub fn extract_container_id(dir_name: &str) -> Option<String> {
        let name = dir_name.strip_suffix(".scope").unwrap_or(dir_name);
        let id = SCOPE_PREFIXES
            .iter()
            .find_map(|prefix| name.strip_prefix(prefix))
            .unwrap_or(name);

        if id.len() == 64 && id.chars().all(|c| c.is_ascii_hexdigit()) {
            Some(id.to_string())
        } else {
            None
        }
    }

    fn unit_path(&self, unit: &UnitInfo) -> Result<PathBuf> {
        let path = self.cgroup_root.join(&unit.id);
        if !path.exists() {
            anyhow::bail!("Cgroup path not found for unit {}", unit.name);
        }
        Ok(path)
    }

    async fn read_optional(path: &Path) -> Option<String> {
        fs::read_to_string(path).await.ok()
    }

    async fn host_memory_bytes(&self) -> Option<u64> {
        let content = Self::read_optional(&self.proc_path.join("meminfo")).await?;
        Self::parse_mem_total(&content)
    }

    fn cpu_percent(&self, unit_id: &str, usage_usec: u64) -> f64 {
        let now = Instant::now();
        let mut samples = self.cpu_samples.lock();
        let previous = samples.insert(
            unit_id.to_string(),
            CpuSample {
                usage_usec,
                at: now,
            },
        );

        match previous {
            Some(prev) => {
                let elapsed = now.duration_since(prev.at);
                Self::cpu_percent_between(prev.usage_usec, usage_usec, elapsed)
            }
            None => 0.0,
        }
    }

    /// Walk the hierarchy looking for container cgroups
    async fn scan(&self) -> Result<Vec<UnitInfo>> {
        self.walk(vec![self.cgroup_root.clone()]).await
    }

    /// Walk from `pending`. Only the root must be readable: cgroups below it
    /// come and go while the walk runs and are skipped when they vanish.
    pub(super) async fn walk(&self, mut pending: Vec<PathBuf>) -> Result<Vec<UnitInfo>> {
        let mut units = Vec::new();

        while let Some(dir) = pending.pop() {
            if let Err(e) = self.scan_dir(&dir, &mut units, &mut pending).await {
                if dir == self.cgroup_root {
                    return Err(e).with_context(|| format!("Failed to read {}", dir.display()));
                }
                debug!(path = %dir.display(), error = %e, "Skipping cgroup changed during scan");
            }
        }

        Ok(units)
    }

    async fn scan_dir(
        &self,
        dir: &Path,
        units: &mut Vec<UnitInfo>,
        pending: &mut Vec<PathBuf>,
    ) -> std::io::Result<()> {
        let mut entries = fs::read_dir(dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            match entry.file_type().await {
                Ok(file_type) if file_type.is_dir() => {}
                _ => continue,
            }

            let entry_path = entry.path();
            let name = entry.file_name().to_string_lossy().to_string();

            let Some(container_id) = Self::extract_container_id(&name) else {
                pending.push(entry_path);
                continue;
            };

            // Container cgroups do not nest further containers
            let complete =
                entry_path.join("cgroup.procs").exists() && entry_path.join("cpu.stat").exists();
            if complete {
                let relative = entry_path
                    .strip_prefix(&self.cgroup_root)
                    .unwrap_or(&entry_path)
                    .to_string_lossy()
                    .to_string();
                units.push(UnitInfo::new(relative, &container_id[..SHORT_ID_LEN]));
            }
        }

        Ok(())
    }
}

#[async_trait]
impl UnitSource for CgroupV2Source {
    async fn list_units(&self) -> Result<Vec<UnitInfo>> {
        let mut units = self.scan().await?;
        units.sort_by(|a, b| a.name.cmp(&b.name));

        // Forget CPU readings for units that disappeared
        let present: Vec<&str> = units.iter().map(|u| u.id.as_str()).collect();
        self.cpu_samples
            .lock()
            .retain(|id, _| present.contains(&id.as_str()));

        Ok(units)
    }

    async fn fetch_metrics(&self, unit: &UnitInfo) -> Result<MetricsSnapshot> {
        let path = self.unit_path(unit)?;

        let cpu_stat = fs::read_to_string(path.join("cpu.stat"))
            .await
            .with_context(|| format!("Failed to read cpu.stat for {}", unit.name))?;
        let cpu_percent = self.cpu_percent(&unit.id, Self::parse_cpu_stat(&cpu_stat));

        let memory_current = Self::read_optional(&path.join("memory.current"))
            .await
            .and_then(|c| c.trim().parse::<u64>().ok())
            .unwrap_or(0);

        let memory_limit = match Self::read_optional(&path.join("memory.max"))
            .await
            .and_then(|c| Self::parse_limit(&c))
        {
            Some(limit) => Some(limit),
            None => self.host_memory_bytes().await,
        };

        let memory_percent = match memory_limit {
            Some(limit) if limit > 0 => memory_current as f64 / limit as f64 * 100.0,
            _ => 0.0,
        };

        let pids = Self::read_optional(&path.join("pids.current"))
            .await
            .and_then(|c| c.trim().parse::<u64>().ok())
            .unwrap_or(0);

        Ok(MetricsSnapshot {
            cpu_percent: round2(cpu_percent),
            memory_percent: round2(memory_percent),
            pids,
        })
    }

    async fn fetch_state(&self, unit: &UnitInfo) -> Result<StateSnapshot> {
        let path = self.unit_path(unit)?;

        let frozen = Self::read_optional(&path.join("cgroup.freeze"))
            .await
            .map(|c| c.trim() == "1")
            .unwrap_or(false);

        let procs = fs::read_to_string(path.join("cgroup.procs"))
            .await
            .with_context(|| format!("Failed to read cgroup.procs for {}", unit.name))?;

        let status = if frozen {
            "paused"
        } else if procs.lines().any(|l| !l.trim().is_empty()) {
            StateSnapshot::RUNNING
        } else {
            "exited"
        };

        let oom_kills = Self::read_optional(&path.join("memory.events"))
            .await
            .map(|c| Self::parse_keyed(&c).get("oom_kill").copied().unwrap_or(0))
            .unwrap_or(0);

        Ok(StateSnapshot {
            status: status.to_string(),
            // cgroups do not record runtime restarts
            restart_count: 0,
            oom_killed: oom_kills > 0,
        })
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
