mod schema;
mod sqlite;

pub use sqlite::Store;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::registry::{DuplicateMonitor, MonitorKey};

/// One timestamped probe result. Immutable once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// Unix seconds at probe completion.
    pub timestamp: i64,
    /// Elapsed milliseconds.
    pub time: f64,
    /// Status code as a decimal string, or an `"Error: "`-prefixed description.
    pub response: String,
}

/// Aggregate over one monitor's observations since a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct WindowStats {
    pub count: u64,
    pub up: u64,
    pub avg_time: f64,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to open database: {0}")]
    Open(String),
    #[error("storage write failed: {0}")]
    Write(String),
    #[error("storage read failed: {0}")]
    Read(String),
    #[error("monitor {0} not found")]
    NotFound(MonitorKey),
    #[error(transparent)]
    DuplicateMonitor(#[from] DuplicateMonitor),
    #[error("store is closed")]
    Closed,
    #[error("store unavailable: {0}")]
    Unavailable(String),
}
