//! Typed threshold names and the threshold set

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{WatchError, WatchResult};

/// Known threshold names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdKey {
    CpuWarning,
    CpuCritical,
    MemoryWarning,
    MemoryCritical,
    RestartWarning,
    RestartCritical,
}

impl ThresholdKey {
    pub const ALL: [ThresholdKey; 6] = [
        ThresholdKey::CpuWarning,
        ThresholdKey::CpuCritical,
        ThresholdKey::MemoryWarning,
        ThresholdKey::MemoryCritical,
        ThresholdKey::RestartWarning,
        ThresholdKey::RestartCritical,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ThresholdKey::CpuWarning => "cpu_warning",
            ThresholdKey::CpuCritical => "cpu_critical",
            ThresholdKey::MemoryWarning => "memory_warning",
            ThresholdKey::MemoryCritical => "memory_critical",
            ThresholdKey::RestartWarning => "restart_warning",
            ThresholdKey::RestartCritical => "restart_critical",
        }
    }

    /// The (warning, critical) pair this key belongs to
    pub fn pair(&self) -> (ThresholdKey, ThresholdKey) {
        match self {
            ThresholdKey::CpuWarning | ThresholdKey::CpuCritical => {
                (ThresholdKey::CpuWarning, ThresholdKey::CpuCritical)
            }
            ThresholdKey::MemoryWarning | ThresholdKey::MemoryCritical => {
                (ThresholdKey::MemoryWarning, ThresholdKey::MemoryCritical)
            }
            ThresholdKey::RestartWarning | ThresholdKey::RestartCritical => {
                (ThresholdKey::RestartWarning, ThresholdKey::RestartCritical)
            }
        }
    }
}

impl std::fmt::Display for ThresholdKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ThresholdKey {
    type Err = WatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_ascii_lowercase();
        ThresholdKey::ALL
            .into_iter()
            .find(|key| key.as_str() == name)
            .ok_or_else(|| WatchError::InvalidThreshold(format!("unknown threshold '{}'", s)))
    }
}

/// Warning/critical limits for every metric pair
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdSet {
    pub cpu_warning: f64,
    pub cpu_critical: f64,
    pub memory_warning: f64,
    pub memory_critical: f64,
    pub restart_warning: f64,
    pub restart_critical: f64,
}

impl Default for ThresholdSet {
    fn default() -> Self {
        Self {
            cpu_warning: 70.0,
            cpu_critical: 90.0,
            memory_warning: 75.0,
            memory_critical: 90.0,
            restart_warning: 3.0,
            restart_critical: 10.0,
        }
    }
}

impl ThresholdSet {
    pub fn get(&self, key: ThresholdKey) -> f64 {
        match key {
            ThresholdKey::CpuWarning => self.cpu_warning,
            ThresholdKey::CpuCritical => self.cpu_critical,
            ThresholdKey::MemoryWarning => self.memory_warning,
            ThresholdKey::MemoryCritical => self.memory_critical,
            ThresholdKey::RestartWarning => self.restart_warning,
            ThresholdKey::RestartCritical => self.restart_critical,
        }
    }

    fn slot_mut(&mut self, key: ThresholdKey) -> &mut f64 {
        match key {
            ThresholdKey::CpuWarning => &mut self.cpu_warning,
            ThresholdKey::CpuCritical => &mut self.cpu_critical,
            ThresholdKey::MemoryWarning => &mut self.memory_warning,
            ThresholdKey::MemoryCritical => &mut self.memory_critical,
            ThresholdKey::RestartWarning => &mut self.restart_warning,
            ThresholdKey::RestartCritical => &mut self.restart_critical,
        }
    }

    /// Return a copy with `key` set to `value`, validated as a whole
    pub fn with(&self, key: ThresholdKey, value: f64) -> WatchResult<ThresholdSet> {
        let mut next = *self;
        *next.slot_mut(key) = value;
        next.validate()?;
        Ok(next)
    }

    /// Every value must be finite and non-negative, and every critical limit
    /// must exceed its warning limit.
    pub fn validate(&self) -> WatchResult<()> {
        for key in ThresholdKey::ALL {
            let value = self.get(key);
            if !value.is_finite() || value < 0.0 {
                return Err(WatchError::InvalidThreshold(format!(
                    "{} must be a non-negative number, got {}",
                    key, value
                )));
            }
        }

        for (warning, critical) in [
            ThresholdKey::CpuWarning.pair(),
            ThresholdKey::MemoryWarning.pair(),
            ThresholdKey::RestartWarning.pair(),
        ] {
            if self.get(critical) <= self.get(warning) {
                return Err(WatchError::InvalidThreshold(format!(
                    "{} ({}) must exceed {} ({})",
                    critical,
                    self.get(critical),
                    warning,
                    self.get(warning)
                )));
            }
        }

        Ok(())
    }

    /// Iterate over (key, value) in declaration order
    pub fn entries(&self) -> impl Iterator<Item = (ThresholdKey, f64)> + '_ {
        ThresholdKey::ALL.into_iter().map(|key| (key, self.get(key)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_parsing() {
        assert_eq!("cpu_warning".parse::<ThresholdKey>().unwrap(), ThresholdKey::CpuWarning);
        assert_eq!(
            " Restart_Critical ".parse::<ThresholdKey>().unwrap(),
            ThresholdKey::RestartCritical
        );

        let err = "disk_warning".parse::<ThresholdKey>().unwrap_err();
        assert!(err.is_rejection());
    }

    #[test]
    fn test_defaults_are_valid() {
        let set = ThresholdSet::default();
        assert!(set.validate().is_ok());
        assert_eq!(set.get(ThresholdKey::CpuWarning), 70.0);
        assert_eq!(set.get(ThresholdKey::MemoryWarning), 75.0);
        assert_eq!(set.get(ThresholdKey::RestartCritical), 10.0);
    }

    #[test]
    fn test_with_rejects_inverted_pair() {
        let set = ThresholdSet::default();

        assert!(set.with(ThresholdKey::CpuWarning, 95.0).is_err());
        assert!(set.with(ThresholdKey::MemoryCritical, 75.0).is_err());
        assert!(set.with(ThresholdKey::RestartWarning, -1.0).is_err());
        assert!(set.with(ThresholdKey::CpuCritical, f64::NAN).is_err());

        let updated = set.with(ThresholdKey::CpuWarning, 50.0).unwrap();
        assert_eq!(updated.cpu_warning, 50.0);
        // Original untouched
        assert_eq!(set.cpu_warning, 70.0);
    }

    #[test]
    fn test_serializes_as_flat_map() {
        let json = serde_json::to_value(ThresholdSet::default()).unwrap();
        assert_eq!(json["cpu_critical"], 90.0);
        assert_eq!(json["restart_warning"], 3.0);
        assert_eq!(json.as_object().unwrap().len(), 6);
    }
}
