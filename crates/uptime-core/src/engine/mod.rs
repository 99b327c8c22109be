mod purger;
mod scheduler;
mod state;

pub use purger::{purge_cycle, Purger};
pub use scheduler::Scheduler;
pub use state::SchedulerState;

use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

/// Run `tick` once per `period`, starting one period from now, until the
/// shutdown flag flips to `true` or its sender is dropped. Ticks are not
/// skipped to catch up after a stall. `period` must be non-zero.
fn spawn_periodic<F, Fut>(
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
    mut tick: F,
) -> JoinHandle<()>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow_and_update() {
                        break;
                    }
                }
                _ = ticker.tick() => tick().await,
            }
        }
    })
}
