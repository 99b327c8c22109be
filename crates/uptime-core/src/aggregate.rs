//! Point-in-time summaries and calendar-day rollups over stored observations.

use chrono::{DateTime, Days, NaiveDate, NaiveTime, TimeDelta, TimeZone};
use serde::{Deserialize, Serialize};

use crate::probe::ERROR_PREFIX;
use crate::registry::MonitorKey;
use crate::store::{Store, StoreError, WindowStats};

pub const NO_DATA_STATUS: &str = "No data yet";
pub const MAX_HISTORY_DAYS: u32 = 365;

const SUMMARY_WINDOW_SECS: i64 = 24 * 60 * 60;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub current_status: String,
    pub uptime_percentage_24h: f64,
    pub average_response_time_24h: f64,
}

impl Summary {
    fn from_parts(current_status: String, stats: WindowStats) -> Self {
        let uptime_percentage_24h = if stats.count == 0 {
            0.0
        } else {
            stats.up as f64 / stats.count as f64 * 100.0
        };
        Self {
            current_status,
            uptime_percentage_24h,
            average_response_time_24h: if stats.count == 0 { 0.0 } else { stats.avg_time },
        }
    }
}

/// Up/down classification of a stored response string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeClass {
    Up,
    Down,
    Unknown,
}

impl OutcomeClass {
    pub fn classify(response: &str) -> Self {
        if response.starts_with('2') {
            Self::Up
        } else if response.starts_with('4')
            || response.starts_with('5')
            || response.starts_with(ERROR_PREFIX)
        {
            Self::Down
        } else {
            Self::Unknown
        }
    }
}

/// One calendar day of observations. Days without data report all zeros.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyBucket {
    pub date: NaiveDate,
    pub total: u64,
    pub up: u64,
    pub down: u64,
    pub unknown: u64,
    pub uptime_percentage: f64,
}

impl DailyBucket {
    fn empty(date: NaiveDate) -> Self {
        Self {
            date,
            total: 0,
            up: 0,
            down: 0,
            unknown: 0,
            uptime_percentage: 0.0,
        }
    }

    fn record(&mut self, class: OutcomeClass) {
        self.total += 1;
        match class {
            OutcomeClass::Up => self.up += 1,
            OutcomeClass::Down => self.down += 1,
            OutcomeClass::Unknown => self.unknown += 1,
        }
    }

    fn finish(&mut self) {
        if self.total > 0 {
            self.uptime_percentage = self.up as f64 / self.total as f64 * 100.0;
        }
    }
}

/// Current status plus 24h uptime and mean latency, as of `now` (Unix seconds).
pub async fn summarize(store: &Store, key: &MonitorKey, now: i64) -> Result<Summary, StoreError> {
    if !store.contains(key).await? {
        return Err(StoreError::NotFound(key.clone()));
    }

    let current_status = store
        .latest_observation(key)
        .await?
        .map(|o| o.response)
        .unwrap_or_else(|| NO_DATA_STATUS.to_string());

    let stats = store
        .window_stats(key, now.saturating_sub(SUMMARY_WINDOW_SECS))
        .await?;

    Ok(Summary::from_parts(current_status, stats))
}

/// Unix timestamp of the first local instant of `date`. When a DST gap
/// swallows midnight the day starts at the first valid quarter hour after it.
fn day_start<Tz: TimeZone>(tz: &Tz, date: NaiveDate) -> i64 {
    let midnight = date.and_time(NaiveTime::MIN);
    (0..=16)
        .map(|step| midnight + TimeDelta::minutes(15 * step))
        .find_map(|local| tz.from_local_datetime(&local).earliest())
        .map(|start| start.timestamp())
        .unwrap_or_else(|| tz.from_utc_datetime(&midnight).timestamp())
}

/// Per-day counts for the last `days` calendar days in `now`'s time zone,
/// oldest first and ending with today. `days` is capped at [`MAX_HISTORY_DAYS`].
pub async fn daily_history<Tz: TimeZone>(
    store: &Store,
    key: &MonitorKey,
    days: u32,
    now: DateTime<Tz>,
) -> Result<Vec<DailyBucket>, StoreError> {
    if !store.contains(key).await? {
        return Err(StoreError::NotFound(key.clone()));
    }

    let days = days.min(MAX_HISTORY_DAYS);
    if days == 0 {
        return Ok(Vec::new());
    }

    let tz = now.timezone();
    let today = now.date_naive();
    let dates: Vec<NaiveDate> = (0..days)
        .rev()
        .filter_map(|back| today.checked_sub_days(Days::new(u64::from(back))))
        .collect();
    let starts: Vec<i64> = dates.iter().map(|d| day_start(&tz, *d)).collect();
    let window_end = today
        .succ_opt()
        .map(|d| day_start(&tz, d))
        .unwrap_or(i64::MAX);

    let Some(&window_start) = starts.first() else {
        return Ok(Vec::new());
    };

    let rows = store
        .query_observations(key, window_start, window_end.saturating_sub(1))
        .await?;

    let mut buckets: Vec<DailyBucket> = dates.into_iter().map(DailyBucket::empty).collect();
    for obs in &rows {
        // Index of the last day starting at or before the observation.
        let idx = starts.partition_point(|&s| s <= obs.timestamp);
        if idx == 0 {
            continue;
        }
        buckets[idx - 1].record(OutcomeClass::classify(&obs.response));
    }
    buckets.iter_mut().for_each(DailyBucket::finish);

    Ok(buckets)
}
