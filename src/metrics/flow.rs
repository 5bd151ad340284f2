use chrono::NaiveDate;

use super::types::{category, MetricRow};
use super::Calculator;
use crate::date_util::{days_between, parse_opt, parse_timestamp, within_last_days};
use crate::model::{Issue, Snapshot};
use crate::stats::{calculate_percentiles, mean, round2};

/// Cycle time, lead time, weekly throughput and WIP.
pub struct FlowCalculator;

impl Calculator for FlowCalculator {
    fn categories(&self) -> &'static [&'static str] {
        &[category::FLOW]
    }

    fn calculate(&self, snapshot: &Snapshot, today: NaiveDate) -> Vec<MetricRow> {
        let issues = &snapshot.issues;
        let cycle_times = cycle_times_days(issues);
        let lead_times = lead_times_days(issues);
        let cycle_time_pcts = calculate_percentiles(&cycle_times, &[50.0, 90.0]);

        let weekly_throughput = issues
            .iter()
            .filter_map(|i| parse_opt(i.completed_at.as_deref()))
            .filter(|ts| within_last_days(*ts, today, 7))
            .count();
        let current_wip = issues.iter().filter(|i| i.state.kind == "started").count();

        let row = |metric: &str, value: f64| MetricRow::new(today, category::FLOW, metric, value);
        vec![
            row("avg_cycle_time_days", round2(mean(&cycle_times))),
            row("avg_lead_time_days", round2(mean(&lead_times))),
            row("cycle_time_p50_days", cycle_time_pcts[0]),
            row("cycle_time_p90_days", cycle_time_pcts[1]),
            row("weekly_throughput", weekly_throughput as f64),
            row("current_wip", current_wip as f64),
        ]
    }
}

/// `completedAt - startedAt` in days for issues that have both.
pub fn cycle_times_days(issues: &[Issue]) -> Vec<f64> {
    issues
        .iter()
        .filter_map(|i| {
            let started = parse_opt(i.started_at.as_deref())?;
            let completed = parse_opt(i.completed_at.as_deref())?;
            Some(days_between(started, completed))
        })
        .collect()
}

/// `completedAt - createdAt` in days for completed issues.
pub fn lead_times_days(issues: &[Issue]) -> Vec<f64> {
    issues
        .iter()
        .filter_map(|i| {
            let completed = parse_opt(i.completed_at.as_deref())?;
            let created = parse_timestamp(&i.created_at)?;
            Some(days_between(created, completed))
        })
        .collect()
}
