use std::time::Duration;

use serde::{Deserialize, Serialize};

const SECS_PER_DAY: u64 = 24 * 60 * 60;

/// Runtime settings for the probe scheduler and retention purger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Period between full probe passes (default: 5 minutes).
    pub check_interval: Duration,
    /// Maximum age of stored observations (default: 90 days).
    pub retention: Duration,
    /// Period between purge cycles (default: 24 hours).
    pub purge_interval: Duration,
    /// Optional whole-request timeout for probes. `None` leaves the transport's own behaviour.
    pub request_timeout: Option<Duration>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            check_interval: Duration::from_secs(5 * 60),
            retention: Duration::from_secs(90 * SECS_PER_DAY),
            purge_interval: Duration::from_secs(SECS_PER_DAY),
            request_timeout: None,
        }
    }
}

impl EngineConfig {
    pub fn with_check_interval_secs(mut self, secs: u64) -> Self {
        self.check_interval = Duration::from_secs(secs.max(1));
        self
    }

    pub fn with_retention_days(mut self, days: u32) -> Self {
        self.retention = Duration::from_secs(u64::from(days) * SECS_PER_DAY);
        self
    }

    pub fn with_purge_interval_secs(mut self, secs: u64) -> Self {
        self.purge_interval = Duration::from_secs(secs.max(1));
        self
    }

    pub fn with_request_timeout_ms(mut self, ms: u64) -> Self {
        self.request_timeout = Some(Duration::from_millis(ms));
        self
    }

    /// Retention horizon in whole seconds, saturating at `i64::MAX`.
    pub fn retention_secs(&self) -> i64 {
        i64::try_from(self.retention.as_secs()).unwrap_or(i64::MAX)
    }
}
