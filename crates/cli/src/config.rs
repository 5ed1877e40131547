//! Configuration management for the CLI

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_AGENT_URL: &str = "http://localhost:8080";

/// CLI configuration, stored at `~/.config/fwctl/config.json`
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Agent base URL
    pub agent_url: Option<String>,
}

impl Config {
    /// Load configuration from the default location; a missing file is empty config
    pub fn load() -> Result<Self> {
        match Self::config_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        serde_json::from_str(&content).context("Failed to parse config file")
    }

    fn config_path() -> Option<PathBuf> {
        dirs_next::home_dir().map(|home| home.join(".config").join("fwctl").join("config.json"))
    }

    /// Flag or environment value first, then the config file, then the default
    pub fn agent_url(&self, flag: Option<String>) -> String {
        flag.or_else(|| self.agent_url.clone())
            .unwrap_or_else(|| DEFAULT_AGENT_URL.to_string())
    }
}
