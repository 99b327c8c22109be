#![forbid(unsafe_code)]

pub mod aggregate;
pub mod config;
pub mod engine;
pub mod probe;
pub mod query;
pub mod registry;
pub mod store;

pub use aggregate::{DailyBucket, OutcomeClass, Summary, MAX_HISTORY_DAYS, NO_DATA_STATUS};
pub use config::EngineConfig;
pub use engine::{Purger, Scheduler, SchedulerState};
pub use probe::{HttpProber, Outcome, ProbeResult, Prober, ERROR_PREFIX};
pub use query::{QueryError, QueryFacade};
pub use registry::{Monitor, MonitorKey, MonitorRegistry};
pub use store::{Observation, Store, StoreError, WindowStats};
