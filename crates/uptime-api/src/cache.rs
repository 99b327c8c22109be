//! Short-lived response cache in front of the summary computation.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::time::Instant;

use uptime_core::{MonitorKey, Summary};

pub const DEFAULT_SUMMARY_TTL: Duration = Duration::from_secs(60);

#[derive(Clone)]
pub struct SummaryCache {
    entries: Arc<DashMap<MonitorKey, (Instant, Summary)>>,
    ttl: Duration,
}

impl SummaryCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            ttl,
        }
    }

    /// Fresh entry for `key`, if any. Expired entries are evicted on read.
    pub fn get(&self, key: &MonitorKey) -> Option<Summary> {
        {
            let entry = self.entries.get(key)?;
            let (stored_at, summary) = entry.value();
            if stored_at.elapsed() < self.ttl {
                return Some(summary.clone());
            }
        }
        self.entries.remove(key);
        None
    }

    pub fn insert(&self, key: MonitorKey, summary: Summary) {
        self.entries.insert(key, (Instant::now(), summary));
    }
}

impl Default for SummaryCache {
    fn default() -> Self {
        Self::new(DEFAULT_SUMMARY_TTL)
    }
}
