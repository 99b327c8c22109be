use std::fmt::Write;

use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;

use uptime_core::{OutcomeClass, SchedulerState, NO_DATA_STATUS};

use crate::state::AppState;

pub async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    let mut out = String::with_capacity(4096);
    let monitors = state.facade.list_monitors();

    write_engine(&mut out, &state, monitors.len()).await;

    let mut summaries = Vec::with_capacity(monitors.len());
    for m in &monitors {
        match state.facade.summarize(&m.group, &m.name).await {
            Ok(s) => summaries.push((m, s)),
            Err(e) => tracing::warn!(
                group = %m.group,
                name = %m.name,
                error = %e,
                "Skipping monitor in metrics"
            ),
        }
    }

    writeln!(out, "# TYPE uptime_monitor_up gauge").unwrap();
    writeln!(out, "# HELP uptime_monitor_up Whether the latest check succeeded").unwrap();
    for (m, s) in &summaries {
        if s.current_status == NO_DATA_STATUS {
            continue;
        }
        let up = OutcomeClass::classify(&s.current_status) == OutcomeClass::Up;
        writeln!(
            out,
            "uptime_monitor_up{{group=\"{}\",name=\"{}\"}} {}",
            escape(&m.group),
            escape(&m.name),
            if up { 1 } else { 0 }
        )
        .unwrap();
    }

    writeln!(out, "# TYPE uptime_monitor_uptime_ratio_24h gauge").unwrap();
    writeln!(
        out,
        "# HELP uptime_monitor_uptime_ratio_24h Share of 2xx checks over the last 24 hours"
    )
    .unwrap();
    for (m, s) in &summaries {
        writeln!(
            out,
            "uptime_monitor_uptime_ratio_24h{{group=\"{}\",name=\"{}\"}} {:.4}",
            escape(&m.group),
            escape(&m.name),
            s.uptime_percentage_24h / 100.0
        )
        .unwrap();
    }

    writeln!(out, "# TYPE uptime_monitor_response_time_ms_24h gauge").unwrap();
    writeln!(
        out,
        "# HELP uptime_monitor_response_time_ms_24h Mean response time over the last 24 hours"
    )
    .unwrap();
    for (m, s) in &summaries {
        writeln!(
            out,
            "uptime_monitor_response_time_ms_24h{{group=\"{}\",name=\"{}\"}} {:.3}",
            escape(&m.group),
            escape(&m.name),
            s.average_response_time_24h
        )
        .unwrap();
    }

    writeln!(out, "# EOF").unwrap();

    (
        [(
            header::CONTENT_TYPE,
            "application/openmetrics-text; version=1.0.0; charset=utf-8",
        )],
        out,
    )
}

async fn write_engine(out: &mut String, state: &AppState, monitor_count: usize) {
    if let Some(scheduler) = &state.scheduler {
        let current = scheduler.state().await;
        writeln!(out, "# TYPE uptime_monitor_scheduler_state stateset").unwrap();
        writeln!(
            out,
            "# HELP uptime_monitor_scheduler_state Current state of the probe scheduler"
        )
        .unwrap();
        for variant in SchedulerState::ALL {
            writeln!(
                out,
                "uptime_monitor_scheduler_state{{state=\"{}\"}} {}",
                variant,
                if variant == current { 1 } else { 0 }
            )
            .unwrap();
        }
    }

    writeln!(out, "# TYPE uptime_monitor_monitors gauge").unwrap();
    writeln!(out, "# HELP uptime_monitor_monitors Number of configured monitors").unwrap();
    writeln!(out, "uptime_monitor_monitors {}", monitor_count).unwrap();

    match state.facade.store().observation_count().await {
        Ok(count) => {
            writeln!(out, "# TYPE uptime_monitor_observations gauge").unwrap();
            writeln!(
                out,
                "# HELP uptime_monitor_observations Observations currently retained"
            )
            .unwrap();
            writeln!(out, "uptime_monitor_observations {}", count).unwrap();
        }
        Err(e) => tracing::warn!(error = %e, "Could not count observations"),
    }

    if let Some(purger) = &state.purger {
        writeln!(out, "# TYPE uptime_monitor_purge_cycles counter").unwrap();
        writeln!(out, "# HELP uptime_monitor_purge_cycles Retention purge cycles run").unwrap();
        writeln!(out, "uptime_monitor_purge_cycles_total {}", purger.cycle_count()).unwrap();
        writeln!(out, "# TYPE uptime_monitor_purge_failures counter").unwrap();
        writeln!(
            out,
            "# HELP uptime_monitor_purge_failures Retention purge cycles that failed"
        )
        .unwrap();
        writeln!(out, "uptime_monitor_purge_failures_total {}", purger.failure_count()).unwrap();
    }
}

fn escape(label: &str) -> String {
    label
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}
