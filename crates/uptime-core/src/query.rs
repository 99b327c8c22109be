//! Read-side entry point used by the API layer.

use std::sync::Arc;

use chrono::{Local, Utc};
use thiserror::Error;

use crate::aggregate::{self, DailyBucket, Summary};
use crate::registry::{Monitor, MonitorKey, MonitorRegistry};
use crate::store::{Observation, Store, StoreError};

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("monitor '{group}/{name}' not found")]
    NotFound { group: String, name: String },
    #[error("no monitors found for group '{0}'")]
    GroupNotFound(String),
    #[error("start ({start}) must not be after end ({end})")]
    InvalidRange { start: i64, end: i64 },
    #[error(transparent)]
    Storage(StoreError),
}

impl From<StoreError> for QueryError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(key) => QueryError::NotFound {
                group: key.group,
                name: key.name,
            },
            other => QueryError::Storage(other),
        }
    }
}

#[derive(Clone)]
pub struct QueryFacade {
    store: Arc<Store>,
    registry: Arc<MonitorRegistry>,
}

impl QueryFacade {
    pub fn new(store: Arc<Store>, registry: Arc<MonitorRegistry>) -> Self {
        Self { store, registry }
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    fn known_key(&self, group: &str, name: &str) -> Result<MonitorKey, QueryError> {
        let key = MonitorKey::new(group, name);
        if self.registry.contains(&key) {
            Ok(key)
        } else {
            Err(QueryError::NotFound {
                group: group.to_string(),
                name: name.to_string(),
            })
        }
    }

    /// Every configured monitor, sorted by `(group, name)`.
    pub fn list_monitors(&self) -> Vec<Monitor> {
        self.registry.monitors()
    }

    pub fn list_monitors_by_group(&self, group: &str) -> Result<Vec<Monitor>, QueryError> {
        let monitors = self.registry.in_group(group);
        if monitors.is_empty() {
            return Err(QueryError::GroupNotFound(group.to_string()));
        }
        Ok(monitors)
    }

    pub async fn summarize(&self, group: &str, name: &str) -> Result<Summary, QueryError> {
        let key = self.known_key(group, name)?;
        Ok(aggregate::summarize(&self.store, &key, Utc::now().timestamp()).await?)
    }

    /// Raw observations with `start <= timestamp <= end`, oldest first.
    pub async fn list_checks(
        &self,
        group: &str,
        name: &str,
        start: i64,
        end: i64,
    ) -> Result<Vec<Observation>, QueryError> {
        let key = self.known_key(group, name)?;
        if start > end {
            return Err(QueryError::InvalidRange { start, end });
        }
        Ok(self.store.query_observations(&key, start, end).await?)
    }

    /// Per-day rollup for the last `days` local calendar days, oldest first.
    pub async fn daily_history(
        &self,
        group: &str,
        name: &str,
        days: u32,
    ) -> Result<Vec<DailyBucket>, QueryError> {
        let key = self.known_key(group, name)?;
        Ok(aggregate::daily_history(&self.store, &key, days, Local::now()).await?)
    }
}
