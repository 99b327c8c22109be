use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;

use uptime_core::{DailyBucket, Monitor, MonitorKey, Observation, Summary, MAX_HISTORY_DAYS};

use crate::error::ApiError;
use crate::state::AppState;

const DEFAULT_RANGE_SECS: i64 = 24 * 60 * 60;
const DEFAULT_HISTORY_DAYS: u32 = 90;

#[derive(Debug, Default, Deserialize)]
pub struct ChecksQuery {
    pub range: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
    pub days: Option<String>,
}

/// Inclusive `[start, end]` window in Unix seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub start: i64,
    pub end: i64,
}

impl TimeRange {
    /// `end_time` defaults to `now`. An explicit `start_time` wins over
    /// `range`; otherwise the window reaches `range` (default 24h) back from `now`.
    pub fn resolve(query: &ChecksQuery, now: i64) -> Result<Self, ApiError> {
        let end = match non_empty(&query.end_time) {
            Some(raw) => raw
                .parse::<i64>()
                .map_err(|_| ApiError::BadRequest("invalid end_time parameter".to_string()))?,
            None => now,
        };

        if let Some(raw) = non_empty(&query.start_time) {
            let start = raw
                .parse::<i64>()
                .map_err(|_| ApiError::BadRequest("invalid start_time parameter".to_string()))?;
            if start > end {
                return Err(ApiError::BadRequest(
                    "start_time cannot be after end_time".to_string(),
                ));
            }
            return Ok(Self { start, end });
        }

        let span = match non_empty(&query.range) {
            Some(raw) => parse_range(raw)?,
            None => DEFAULT_RANGE_SECS,
        };
        Ok(Self {
            start: now.saturating_sub(span),
            end,
        })
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// Parse a range such as `90s`, `15m`, `1h`, `24h`, `7d` into seconds.
pub fn parse_range(raw: &str) -> Result<i64, ApiError> {
    let invalid = || {
        ApiError::BadRequest(format!(
            "invalid range parameter '{}', use formats like '1h', '24h', '7d', '30d'",
            raw
        ))
    };

    let raw = raw.trim();
    let unit = raw.chars().last().ok_or_else(invalid)?;
    let multiplier: i64 = match unit {
        's' => 1,
        'm' => 60,
        'h' => 60 * 60,
        'd' => 24 * 60 * 60,
        _ => return Err(invalid()),
    };
    let amount: i64 = raw[..raw.len() - unit.len_utf8()]
        .parse()
        .map_err(|_| invalid())?;
    if amount <= 0 {
        return Err(invalid());
    }
    amount.checked_mul(multiplier).ok_or_else(invalid)
}

fn parse_days(query: &HistoryQuery) -> Result<u32, ApiError> {
    match non_empty(&query.days) {
        Some(raw) => raw
            .parse::<u32>()
            .map(|d| d.min(MAX_HISTORY_DAYS))
            .map_err(|_| ApiError::BadRequest(format!("invalid days parameter '{}'", raw))),
        None => Ok(DEFAULT_HISTORY_DAYS),
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/monitors", get(list_monitors))
        .route("/monitors/{group}", get(list_group))
        .route("/monitors/{group}/{name}/summary", get(get_summary))
        .route("/monitors/{group}/{name}/checks", get(get_checks))
        .route("/monitors/{group}/{name}/history", get(get_history))
}

async fn list_monitors(State(state): State<AppState>) -> Json<Vec<Monitor>> {
    Json(state.facade.list_monitors())
}

async fn list_group(
    State(state): State<AppState>,
    Path(group): Path<String>,
) -> Result<Json<Vec<Monitor>>, ApiError> {
    Ok(Json(state.facade.list_monitors_by_group(&group)?))
}

async fn get_summary(
    State(state): State<AppState>,
    Path((group, name)): Path<(String, String)>,
) -> Result<Json<Summary>, ApiError> {
    let key = MonitorKey::new(group.as_str(), name.as_str());
    if let Some(summary) = state.summaries.get(&key) {
        return Ok(Json(summary));
    }

    let summary = state.facade.summarize(&group, &name).await?;
    state.summaries.insert(key, summary.clone());
    Ok(Json(summary))
}

async fn get_checks(
    State(state): State<AppState>,
    Path((group, name)): Path<(String, String)>,
    Query(query): Query<ChecksQuery>,
) -> Result<Json<Vec<Observation>>, ApiError> {
    let range = TimeRange::resolve(&query, Utc::now().timestamp())?;
    let checks = state
        .facade
        .list_checks(&group, &name, range.start, range.end)
        .await?;
    Ok(Json(checks))
}

async fn get_history(
    State(state): State<AppState>,
    Path((group, name)): Path<(String, String)>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<DailyBucket>>, ApiError> {
    let days = parse_days(&query)?;
    Ok(Json(state.facade.daily_history(&group, &name, days).await?))
}
