use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::spawn_periodic;
use super::state::SchedulerState;
use crate::config::EngineConfig;
use crate::probe::{Outcome, Prober};
use crate::registry::{Monitor, MonitorRegistry};
use crate::store::{Store, StoreError};

/// Fires one concurrent probe per registered monitor on a fixed period.
///
/// A pass never waits for the previous one: slow or hanging targets keep
/// their own task busy while later ticks dispatch fresh probes. Stopping only
/// halts scheduling; probes already in flight finish on their own.
pub struct Scheduler {
    registry: Arc<MonitorRegistry>,
    store: Arc<Store>,
    prober: Arc<dyn Prober>,
    config: EngineConfig,
    state: Arc<RwLock<SchedulerState>>,
    shutdown: watch::Sender<bool>,
    driver: Mutex<Option<JoinHandle<()>>>,
    passes: Arc<AtomicU64>,
    last_pass: Arc<RwLock<Option<DateTime<Utc>>>>,
}

/// What one timed pass needs, cloned into the driver task.
#[derive(Clone)]
struct PassContext {
    registry: Arc<MonitorRegistry>,
    store: Arc<Store>,
    prober: Arc<dyn Prober>,
    passes: Arc<AtomicU64>,
    last_pass: Arc<RwLock<Option<DateTime<Utc>>>>,
}

impl PassContext {
    async fn run(&self) {
        self.passes.fetch_add(1, Ordering::Relaxed);
        *self.last_pass.write().await = Some(Utc::now());
        dispatch_pass(&self.registry, &self.store, &self.prober);
    }
}

impl Scheduler {
    pub fn new(
        registry: Arc<MonitorRegistry>,
        store: Arc<Store>,
        prober: Arc<dyn Prober>,
        config: EngineConfig,
    ) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            registry,
            store,
            prober,
            config,
            state: Arc::new(RwLock::new(SchedulerState::Idle)),
            shutdown,
            driver: Mutex::new(None),
            passes: Arc::new(AtomicU64::new(0)),
            last_pass: Arc::new(RwLock::new(None)),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub async fn state(&self) -> SchedulerState {
        *self.state.read().await
    }

    /// Number of passes dispatched since construction.
    pub fn pass_count(&self) -> u64 {
        self.passes.load(Ordering::Relaxed)
    }

    pub async fn last_pass(&self) -> Option<DateTime<Utc>> {
        *self.last_pass.read().await
    }

    /// Replace the store's monitor registry with this scheduler's monitors.
    pub async fn register(&self) -> Result<usize, StoreError> {
        self.store.replace_monitors(&self.registry.monitors()).await
    }

    fn pass_context(&self) -> PassContext {
        PassContext {
            registry: Arc::clone(&self.registry),
            store: Arc::clone(&self.store),
            prober: Arc::clone(&self.prober),
            passes: Arc::clone(&self.passes),
            last_pass: Arc::clone(&self.last_pass),
        }
    }

    /// Dispatch one pass now and then one per `check_interval` until
    /// [`stop`](Self::stop). Fails on a zero interval.
    pub async fn start(&self) -> Result<(), String> {
        let period = self.config.check_interval;
        if period.is_zero() {
            return Err("check interval must be greater than zero".to_string());
        }

        // Held until the driver is stored so a concurrent stop sees it.
        let mut driver = self.driver.lock().await;
        {
            let mut state = self.state.write().await;
            if *state == SchedulerState::Running {
                return Ok(());
            }
            if !state.can_transition_to(SchedulerState::Running) {
                return Err(format!("cannot start scheduler while {}", *state));
            }
            *state = SchedulerState::Running;
        }

        info!(
            monitors = self.registry.len(),
            interval_secs = period.as_secs_f64(),
            "Starting probe scheduler"
        );

        self.shutdown.send_replace(false);
        let pass = self.pass_context();
        pass.run().await;

        *driver = Some(spawn_periodic(period, self.shutdown.subscribe(), move || {
            let pass = pass.clone();
            async move { pass.run().await }
        }));
        Ok(())
    }

    /// Stop scheduling new passes and wait for the driver to exit.
    pub async fn stop(&self) {
        let mut driver = self.driver.lock().await;
        {
            let mut state = self.state.write().await;
            if *state != SchedulerState::Running {
                return;
            }
            *state = SchedulerState::Stopping;
        }
        info!("Stopping probe scheduler");

        self.shutdown.send_replace(true);
        if let Some(handle) = driver.take() {
            if let Err(e) = handle.await {
                warn!(error = %e, "Scheduler driver ended abnormally");
            }
        }

        *self.state.write().await = SchedulerState::Stopped;
        info!("Probe scheduler stopped");
    }

    /// Dispatch a single pass outside the timer. Returns one handle per probe
    /// so callers can wait for the whole pass.
    pub fn run_pass(&self) -> Vec<JoinHandle<()>> {
        self.passes.fetch_add(1, Ordering::Relaxed);
        dispatch_pass(&self.registry, &self.store, &self.prober)
    }
}

fn dispatch_pass(
    registry: &MonitorRegistry,
    store: &Arc<Store>,
    prober: &Arc<dyn Prober>,
) -> Vec<JoinHandle<()>> {
    let monitors = registry.monitors();
    debug!(count = monitors.len(), "Running scheduled monitor checks");

    monitors
        .into_iter()
        .map(|monitor| {
            let store = Arc::clone(store);
            let prober = Arc::clone(prober);
            tokio::spawn(async move {
                check_monitor(&monitor, prober.as_ref(), &store).await;
            })
        })
        .collect()
}

/// Probe one monitor and append the result. Failures are logged, never raised.
async fn check_monitor(monitor: &Monitor, prober: &dyn Prober, store: &Store) {
    let result = prober.probe(&monitor.url).await;

    match &result.outcome {
        Outcome::Status(status) => info!(
            group = %monitor.group,
            name = %monitor.name,
            status,
            elapsed_ms = result.elapsed_ms,
            "Check completed"
        ),
        Outcome::TransportError(reason) => warn!(
            group = %monitor.group,
            name = %monitor.name,
            elapsed_ms = result.elapsed_ms,
            error = %reason,
            "Check failed"
        ),
    }

    let observation = result.into_observation();
    if let Err(e) = store.append_observation(&monitor.key(), &observation).await {
        warn!(
            group = %monitor.group,
            name = %monitor.name,
            error = %e,
            "Dropping observation that could not be saved"
        );
    }
}
