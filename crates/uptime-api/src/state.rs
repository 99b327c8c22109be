use std::sync::Arc;

use uptime_core::{Purger, QueryFacade, Scheduler};

use crate::cache::SummaryCache;

#[derive(Clone)]
pub struct AppState {
    pub facade: QueryFacade,
    pub scheduler: Option<Arc<Scheduler>>,
    pub purger: Option<Arc<Purger>>,
    pub summaries: SummaryCache,
}

impl AppState {
    pub fn new(facade: QueryFacade) -> Self {
        Self {
            facade,
            scheduler: None,
            purger: None,
            summaries: SummaryCache::default(),
        }
    }

    pub fn with_scheduler(mut self, scheduler: Arc<Scheduler>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    pub fn with_purger(mut self, purger: Arc<Purger>) -> Self {
        self.purger = Some(purger);
        self
    }
}
