//! Owned registry of configured monitors.
//!
//! The registry is built once at startup from the config source and shared by
//! `Arc` with the scheduler, the query facade and the API layer. It never
//! changes while the process runs.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A configured `(group, name, url)` triple to be probed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Monitor {
    pub group: String,
    pub name: String,
    pub url: String,
}

impl Monitor {
    pub fn new(group: impl Into<String>, name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            name: name.into(),
            url: url.into(),
        }
    }

    pub fn key(&self) -> MonitorKey {
        MonitorKey::new(self.group.as_str(), self.name.as_str())
    }
}

/// Two-part monitor identity.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MonitorKey {
    pub group: String,
    pub name: String,
}

impl MonitorKey {
    pub fn new(group: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for MonitorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.group, self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("duplicate monitor {0}")]
pub struct DuplicateMonitor(pub MonitorKey);

#[derive(Debug, Clone, Default)]
pub struct MonitorRegistry {
    monitors: BTreeMap<MonitorKey, Monitor>,
}

impl MonitorRegistry {
    pub fn new(monitors: impl IntoIterator<Item = Monitor>) -> Result<Self, DuplicateMonitor> {
        let mut map = BTreeMap::new();
        for m in monitors {
            let key = m.key();
            if map.contains_key(&key) {
                return Err(DuplicateMonitor(key));
            }
            map.insert(key, m);
        }
        Ok(Self { monitors: map })
    }

    /// All monitors, sorted by `(group, name)`.
    pub fn monitors(&self) -> Vec<Monitor> {
        self.monitors.values().cloned().collect()
    }

    pub fn in_group(&self, group: &str) -> Vec<Monitor> {
        self.monitors
            .values()
            .filter(|m| m.group == group)
            .cloned()
            .collect()
    }

    pub fn contains(&self, key: &MonitorKey) -> bool {
        self.monitors.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.monitors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.monitors.is_empty()
    }
}
