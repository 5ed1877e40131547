//! Agent configuration
//!
//! Read from an optional file (`FLEETWATCH_CONFIG`, default `fleetwatch.toml`)
//! and `FLEETWATCH_*` environment variables, environment taking precedence.

use anyhow::{Context, Result};
use fleetwatch_lib::{MonitorConfig, ThresholdSet};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_CONFIG_FILE: &str = "fleetwatch.toml";

/// Agent configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    /// Node name attached to every log event
    #[serde(default = "default_node_name")]
    pub node_name: String,

    /// Port for the control API, health and metrics
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Mount point of the cgroup v2 hierarchy
    #[serde(default = "default_cgroup_root")]
    pub cgroup_root: PathBuf,

    /// procfs mount, used for host memory size
    #[serde(default = "default_proc_root")]
    pub proc_root: PathBuf,

    #[serde(default = "default_check_interval")]
    pub check_interval_secs: u64,

    #[serde(default = "default_error_backoff")]
    pub error_backoff_secs: u64,

    #[serde(default = "default_stop_grace")]
    pub stop_grace_secs: u64,

    /// Export/load target when a request names no file; requests may only
    /// name files in its directory
    #[serde(default = "default_export_path")]
    pub export_path: PathBuf,

    /// Start the monitor as soon as the agent is up
    #[serde(default = "default_autostart")]
    pub autostart: bool,

    // Threshold overrides; unset keys keep their defaults
    #[serde(default)]
    pub cpu_warning: Option<f64>,
    #[serde(default)]
    pub cpu_critical: Option<f64>,
    #[serde(default)]
    pub memory_warning: Option<f64>,
    #[serde(default)]
    pub memory_critical: Option<f64>,
    #[serde(default)]
    pub restart_warning: Option<f64>,
    #[serde(default)]
    pub restart_critical: Option<f64>,
}

fn default_node_name() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "unknown".to_string())
}

fn default_api_port() -> u16 {
    8080
}

fn default_cgroup_root() -> PathBuf {
    PathBuf::from("/sys/fs/cgroup")
}

fn default_proc_root() -> PathBuf {
    PathBuf::from("/proc")
}

fn default_check_interval() -> u64 {
    30
}

fn default_error_backoff() -> u64 {
    5
}

fn default_stop_grace() -> u64 {
    5
}

fn default_export_path() -> PathBuf {
    PathBuf::from("alerts.json")
}

fn default_autostart() -> bool {
    true
}

impl AgentConfig {
    /// Load configuration from the config file and environment
    pub fn load() -> Result<Self> {
        let file = std::env::var("FLEETWATCH_CONFIG")
            .unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());

        let builder = config::Config::builder()
            .add_source(config::File::with_name(&file).required(false))
            .add_source(config::Environment::with_prefix("FLEETWATCH").try_parsing(true));

        Self::from_builder(builder).with_context(|| format!("loading configuration ({file})"))
    }

    fn from_builder(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<Self> {
        let config = builder.build()?.try_deserialize::<AgentConfig>()?;
        Ok(config)
    }

    pub fn monitor_config(&self) -> MonitorConfig {
        MonitorConfig {
            interval: Duration::from_secs(self.check_interval_secs),
            error_backoff: Duration::from_secs(self.error_backoff_secs),
            stop_grace: Duration::from_secs(self.stop_grace_secs),
        }
    }

    /// Defaults with the configured overrides applied. Not validated here.
    pub fn thresholds(&self) -> ThresholdSet {
        let defaults = ThresholdSet::default();
        ThresholdSet {
            cpu_warning: self.cpu_warning.unwrap_or(defaults.cpu_warning),
            cpu_critical: self.cpu_critical.unwrap_or(defaults.cpu_critical),
            memory_warning: self.memory_warning.unwrap_or(defaults.memory_warning),
            memory_critical: self.memory_critical.unwrap_or(defaults.memory_critical),
            restart_warning: self.restart_warning.unwrap_or(defaults.restart_warning),
            restart_critical: self.restart_critical.unwrap_or(defaults.restart_critical),
        }
    }
}
