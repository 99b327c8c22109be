use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use super::spawn_periodic;
use crate::config::EngineConfig;
use crate::store::{Store, StoreError};

/// Delete observations older than `now - retention_secs`. Returns rows deleted.
pub async fn purge_cycle(store: &Store, retention_secs: i64) -> Result<u64, StoreError> {
    let cutoff = Utc::now().timestamp().saturating_sub(retention_secs);
    let cutoff_rfc3339 = Utc
        .timestamp_opt(cutoff, 0)
        .single()
        .map(|t| t.to_rfc3339())
        .unwrap_or_default();
    info!(cutoff, cutoff_at = %cutoff_rfc3339, "Purging observations past retention");

    let purged = store.purge_before(cutoff).await?;
    info!(purged, "Retention purge completed");
    Ok(purged)
}

/// Best-effort daily housekeeping. A failed cycle is logged and retried on
/// the next tick.
pub struct Purger {
    store: Arc<Store>,
    retention_secs: i64,
    interval: Duration,
    shutdown: watch::Sender<bool>,
    driver: Mutex<Option<JoinHandle<()>>>,
    stats: Arc<CycleStats>,
}

/// Running totals across every cycle, failed ones included.
#[derive(Debug, Default)]
struct CycleStats {
    cycles: AtomicU64,
    failures: AtomicU64,
}

impl CycleStats {
    async fn run(&self, store: &Store, retention_secs: i64) {
        self.cycles.fetch_add(1, Ordering::Relaxed);
        if let Err(e) = purge_cycle(store, retention_secs).await {
            self.failures.fetch_add(1, Ordering::Relaxed);
            error!(error = %e, "Failed to purge old observations");
        }
    }
}

impl Purger {
    pub fn new(store: Arc<Store>, config: &EngineConfig) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            store,
            retention_secs: config.retention_secs(),
            interval: config.purge_interval,
            shutdown,
            driver: Mutex::new(None),
            stats: Arc::new(CycleStats::default()),
        }
    }

    pub async fn run_once(&self) -> Result<u64, StoreError> {
        purge_cycle(&self.store, self.retention_secs).await
    }

    /// Cycles run by [`start`](Self::start) and its timer so far.
    pub fn cycle_count(&self) -> u64 {
        self.stats.cycles.load(Ordering::Relaxed)
    }

    /// How many of those cycles failed.
    pub fn failure_count(&self) -> u64 {
        self.stats.failures.load(Ordering::Relaxed)
    }

    /// Purge now, then once per configured interval. Fails on a zero interval.
    pub async fn start(&self) -> Result<(), String> {
        if self.interval.is_zero() {
            return Err("purge interval must be greater than zero".to_string());
        }

        let mut driver = self.driver.lock().await;
        if driver.is_some() {
            return Ok(());
        }

        info!(
            retention_secs = self.retention_secs,
            interval_secs = self.interval.as_secs(),
            "Starting retention purger"
        );

        self.stats.run(&self.store, self.retention_secs).await;

        self.shutdown.send_replace(false);
        let store = Arc::clone(&self.store);
        let stats = Arc::clone(&self.stats);
        let retention_secs = self.retention_secs;
        *driver = Some(spawn_periodic(self.interval, self.shutdown.subscribe(), move || {
            let store = Arc::clone(&store);
            let stats = Arc::clone(&stats);
            async move { stats.run(&store, retention_secs).await }
        }));
        Ok(())
    }

    pub async fn stop(&self) {
        let Some(handle) = self.driver.lock().await.take() else {
            return;
        };
        self.shutdown.send_replace(true);
        if let Err(e) = handle.await {
            warn!(error = %e, "Purger driver ended abnormally");
        }
        info!("Retention purger stopped");
    }
}
