use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate, Timelike};

use super::bugs::resolution_days;
use super::types::{category, MetricRow};
use super::Calculator;
use crate::config::Rules;
use crate::date_util::{monday_based_weekday, parse_opt, parse_timestamp};
use crate::keys;
use crate::model::{Issue, Snapshot};
use crate::stats::{mean, round2};

pub const TICKETS_CREATED: &str = "tickets_created";
pub const TICKETS_COMPLETED: &str = "tickets_completed";
pub const TRANSITIONS_PREFIX: &str = "transitions_to_";

/// Completion heatmap, daily ticket and transition counters, and per-team
/// bug MTTR.
pub struct ActivityCalculator<'a> {
    rules: &'a Rules,
}

impl<'a> ActivityCalculator<'a> {
    pub fn new(rules: &'a Rules) -> Self {
        Self { rules }
    }
}

/// `transitions_to_<slug>` for a destination state name.
pub fn transition_metric(state_name: &str) -> String {
    let slug: String = state_name
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect();
    format!("{TRANSITIONS_PREFIX}{slug}")
}

/// Daily `(date, metric)` counters.
#[derive(Default)]
struct DailyCounts(BTreeMap<(NaiveDate, String), usize>);

impl DailyCounts {
    fn bump(&mut self, date: NaiveDate, metric: String) {
        *self.0.entry((date, metric)).or_default() += 1;
    }

    fn into_rows(self, category: &str) -> impl Iterator<Item = MetricRow> + '_ {
        self.0
            .into_iter()
            .map(move |((date, metric), count)| MetricRow::new(date, category, metric, count as f64))
    }
}

fn heatmap(issues: &[Issue], today: NaiveDate) -> Vec<MetricRow> {
    let mut cells: BTreeMap<(u32, u32), usize> = BTreeMap::new();
    for ts in issues.iter().filter_map(|i| parse_opt(i.completed_at.as_deref())) {
        let weekday = monday_based_weekday(ts.weekday().num_days_from_sunday());
        *cells.entry((weekday, ts.hour())).or_default() += 1;
    }
    cells
        .into_iter()
        .map(|((weekday, hour), count)| {
            MetricRow::new(
                today,
                category::COMPLETION_HEATMAP,
                keys::encode2(&weekday.to_string(), &hour.to_string()),
                count as f64,
            )
        })
        .collect()
}

impl Calculator for ActivityCalculator<'_> {
    fn categories(&self) -> &'static [&'static str] {
        &[
            category::COMPLETION_HEATMAP,
            category::TIMESERIES,
            category::TIMESERIES_BY_TEAM,
            category::TEAM_MTTR,
        ]
    }

    fn calculate(&self, snapshot: &Snapshot, today: NaiveDate) -> Vec<MetricRow> {
        let issues = &snapshot.issues;
        let mut global = DailyCounts::default();
        let mut by_team = DailyCounts::default();

        let mut record = |date: NaiveDate, team: &str, metric: String| {
            by_team.bump(date, keys::encode2(team, &metric));
            global.bump(date, metric);
        };

        for issue in issues {
            let team = issue.team_name();
            if let Some(created) = parse_timestamp(&issue.created_at) {
                record(created.date_naive(), team, TICKETS_CREATED.to_string());
            }
            if let Some(completed) = parse_opt(issue.completed_at.as_deref()) {
                record(completed.date_naive(), team, TICKETS_COMPLETED.to_string());
            }
            for event in &issue.history {
                let (Some(to), Some(at)) = (&event.to_state, parse_timestamp(&event.created_at)) else {
                    continue;
                };
                if to.name.trim().is_empty() {
                    continue;
                }
                record(at.date_naive(), team, transition_metric(&to.name));
            }
        }

        let mut team_bugs: BTreeMap<&str, Vec<&Issue>> = BTreeMap::new();
        for bug in issues.iter().filter(|i| self.rules.is_bug(&i.labels)) {
            team_bugs.entry(bug.team_name()).or_default().push(bug);
        }
        let mttr = team_bugs.into_iter().filter_map(|(team, bugs)| {
            let days = resolution_days(bugs);
            if days.is_empty() {
                return None;
            }
            Some(MetricRow::new(
                today,
                category::TEAM_MTTR,
                keys::encode2(team, "bug_mttr_days"),
                round2(mean(&days)),
            ))
        });

        let mut rows = heatmap(issues, today);
        rows.extend(global.into_rows(category::TIMESERIES));
        rows.extend(by_team.into_rows(category::TIMESERIES_BY_TEAM));
        rows.extend(mttr);
        rows
    }
}
