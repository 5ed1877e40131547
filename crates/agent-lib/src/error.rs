//! Error types surfaced by the watch core

use std::path::PathBuf;

use thiserror::Error;

/// Errors returned by rule, store and monitor operations.
///
/// Lookup misses (acknowledge/resolve of an unknown id) are not errors;
/// those operations report `false` instead.
#[derive(Debug, Error)]
pub enum WatchError {
    /// Fetching a snapshot for one unit failed. The monitor logs and skips
    /// the unit for the current tick.
    #[error("unit {unit} unavailable: {source}")]
    CollaboratorUnavailable {
        unit: String,
        #[source]
        source: anyhow::Error,
    },

    /// A threshold update named an unknown key or an unacceptable value.
    #[error("invalid threshold: {0}")]
    InvalidThreshold(String),

    /// Export or load could not complete.
    #[error("persistence failure for {path}: {source}")]
    Persistence {
        path: PathBuf,
        #[source]
        source: PersistenceSource,
    },
}

/// Underlying cause of a [`WatchError::Persistence`].
#[derive(Debug, Error)]
pub enum PersistenceSource {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed document: {0}")]
    Json(#[from] serde_json::Error),
}

impl WatchError {
    pub(crate) fn persistence(
        path: impl Into<PathBuf>,
        source: impl Into<PersistenceSource>,
    ) -> Self {
        WatchError::Persistence {
            path: path.into(),
            source: source.into(),
        }
    }

    /// True for errors caused by a bad request rather than the environment
    pub fn is_rejection(&self) -> bool {
        matches!(self, WatchError::InvalidThreshold(_))
    }
}

pub type WatchResult<T> = std::result::Result<T, WatchError>;
