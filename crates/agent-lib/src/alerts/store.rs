//! Alert store with acknowledge/resolve lifecycle
//!
//! Handles:
//! - Id assignment (1-based, never reused, survives `clear_alerts`)
//! - The ordered active list and the bounded history buffer
//! - Statistics over the active list
//! - Atomic JSON export and all-or-nothing load

use std::collections::VecDeque;
use std::fs;
use std::io::Write;
use std::path::Path;

use chrono::Utc;
use parking_lot::Mutex;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use super::types::{format_timestamp, Alert, AlertExport, AlertStats};
use crate::error::{WatchError, WatchResult};
use crate::rules::{Anomaly, ThresholdSet};

/// Maximum number of alerts kept in the history buffer
pub const MAX_HISTORY: usize = 100;

#[derive(Debug)]
struct StoreState {
    active: Vec<Alert>,
    history: VecDeque<Alert>,
    next_id: u64,
}

impl StoreState {
    fn push_history(&mut self, alert: Alert) {
        self.history.push_back(alert);
        while self.history.len() > MAX_HISTORY {
            self.history.pop_front();
        }
    }

    /// Apply `update` to the active alert with `id` and mirror it into history
    fn update(&mut self, id: u64, update: impl Fn(&mut Alert)) -> bool {
        let Some(alert) = self.active.iter_mut().find(|a| a.id == id) else {
            return false;
        };
        update(alert);

        if let Some(entry) = self.history.iter_mut().find(|a| a.id == id) {
            update(entry);
        }
        true
    }
}

/// Shared alert store
///
/// All state sits behind a single mutex; the background monitor and
/// foreground callers go through the same methods.
#[derive(Debug)]
pub struct AlertStore {
    state: Mutex<StoreState>,
}

impl AlertStore {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(StoreState {
                active: Vec::new(),
                history: VecDeque::with_capacity(MAX_HISTORY),
                next_id: 1,
            }),
        }
    }

    /// Wrap an anomaly into a new alert and record it
    pub fn generate_alert(&self, anomaly: &Anomaly, unit_name: &str) -> Alert {
        let mut state = self.state.lock();

        let alert = Alert::new(state.next_id, anomaly, unit_name);
        state.next_id += 1;

        state.active.push(alert.clone());
        state.push_history(alert.clone());

        debug!(
            alert_id = alert.id,
            unit = %unit_name,
            anomaly_type = %anomaly.anomaly_type,
            level = %anomaly.level,
            "Alert generated"
        );
        alert
    }

    /// Active alerts in insertion order
    pub fn get_active_alerts(&self, unacknowledged_only: bool) -> Vec<Alert> {
        let state = self.state.lock();
        state
            .active
            .iter()
            .filter(|a| !unacknowledged_only || !a.acknowledged)
            .cloned()
            .collect()
    }

    /// History buffer, oldest first
    pub fn get_history(&self) -> Vec<Alert> {
        self.state.lock().history.iter().cloned().collect()
    }

    pub fn get_alert(&self, id: u64) -> Option<Alert> {
        self.state.lock().active.iter().find(|a| a.id == id).cloned()
    }

    /// Mark an active alert acknowledged. Returns false if no alert has `id`.
    pub fn acknowledge_alert(&self, id: u64) -> bool {
        let now = format_timestamp(Utc::now());
        let found = self.state.lock().update(id, |a| a.acknowledge(&now));
        if found {
            info!(alert_id = id, "Alert acknowledged");
        }
        found
    }

    /// Mark an active alert resolved. Returns false if no alert has `id`.
    pub fn resolve_alert(&self, id: u64) -> bool {
        let now = format_timestamp(Utc::now());
        let found = self.state.lock().update(id, |a| a.resolve(&now));
        if found {
            info!(alert_id = id, "Alert resolved");
        }
        found
    }

    /// Empty the active list. History and the id counter are kept.
    pub fn clear_alerts(&self) -> usize {
        let mut state = self.state.lock();
        let cleared = state.active.len();
        state.active.clear();
        info!(cleared = cleared, "Active alerts cleared");
        cleared
    }

    /// Number of active alerts, without copying them
    pub fn active_len(&self) -> usize {
        self.state.lock().active.len()
    }

    pub fn get_stats(&self) -> AlertStats {
        AlertStats::from_alerts(self.state.lock().active.iter())
    }

    /// Id the next generated alert will receive
    pub fn next_id(&self) -> u64 {
        self.state.lock().next_id
    }

    /// Write active alerts, history, stats and thresholds to `path`
    ///
    /// The document is written to a uniquely named sibling temp file and
    /// renamed into place, so a failed export never leaves a partial file at
    /// `path` and concurrent exports never share a temp file.
    pub fn export_alerts(
        &self,
        path: impl AsRef<Path>,
        thresholds: &ThresholdSet,
    ) -> WatchResult<()> {
        let path = path.as_ref();

        let document = {
            let state = self.state.lock();
            AlertExport {
                exported_at: Utc::now().to_rfc3339(),
                alerts: state.active.clone(),
                history: state.history.iter().cloned().collect(),
                stats: AlertStats::from_alerts(state.active.iter()),
                thresholds: *thresholds,
                next_id: state.next_id,
            }
        };

        let json = serde_json::to_vec_pretty(&document)
            .map_err(|e| WatchError::persistence(path, e))?;

        let dir = match path.parent().filter(|p| !p.as_os_str().is_empty()) {
            Some(parent) => {
                fs::create_dir_all(parent).map_err(|e| WatchError::persistence(path, e))?;
                parent
            }
            None => Path::new("."),
        };

        if let Err(e) = write_atomically(dir, path, &json) {
            warn!(path = %path.display(), error = %e, "Alert export failed");
            return Err(WatchError::persistence(path, e));
        }

        info!(
            path = %path.display(),
            alerts = document.alerts.len(),
            history = document.history.len(),
            "Alerts exported"
        );
        Ok(())
    }

    /// Replace active alerts and history from an exported document
    ///
    /// The file is read and parsed completely before any state changes; on
    /// failure the store is untouched. The id counter only moves forward, so
    /// ids assigned after a load never collide with loaded ones. Thresholds
    /// are returned in the document but not applied here.
    pub fn load_alerts(&self, path: impl AsRef<Path>) -> WatchResult<AlertExport> {
        let path = path.as_ref();

        let data = fs::read(path).map_err(|e| WatchError::persistence(path, e))?;
        let document: AlertExport =
            serde_json::from_slice(&data).map_err(|e| WatchError::persistence(path, e))?;

        let mut state = self.state.lock();
        state.active = document.alerts.clone();
        state.history = VecDeque::with_capacity(MAX_HISTORY);
        for alert in &document.history {
            state.push_history(alert.clone());
        }

        let max_loaded = state
            .active
            .iter()
            .chain(state.history.iter())
            .map(|a| a.id)
            .max()
            .unwrap_or(0);
        state.next_id = state.next_id.max(document.next_id).max(max_loaded + 1);

        info!(
            path = %path.display(),
            alerts = state.active.len(),
            history = state.history.len(),
            next_id = state.next_id,
            "Alerts loaded"
        );
        Ok(document)
    }
}

impl Default for AlertStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Write `data` to a fresh temp file in `dir`, sync it and rename it over
/// `path`. The temp file is removed when any step fails.
fn write_atomically(dir: &Path, path: &Path, data: &[u8]) -> std::io::Result<()> {
    let mut temp = NamedTempFile::new_in(dir)?;
    temp.write_all(data)?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
