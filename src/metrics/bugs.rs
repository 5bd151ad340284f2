use std::collections::BTreeMap;

use chrono::NaiveDate;

use super::types::{category, MetricRow};
use super::Calculator;
use crate::config::Rules;
use crate::date_util::{days_between, parse_opt, parse_timestamp, within_last_days};
use crate::keys;
use crate::model::{Issue, Snapshot};
use crate::stats::{mean, percent, round2};

pub struct BugCalculator<'a> {
    rules: &'a Rules,
}

impl<'a> BugCalculator<'a> {
    pub fn new(rules: &'a Rules) -> Self {
        Self { rules }
    }
}

/// Creation-to-completion days of resolved bugs. Bugs whose timestamps do
/// not parse are left out.
pub fn resolution_days<'i>(bugs: impl IntoIterator<Item = &'i Issue>) -> Vec<f64> {
    bugs.into_iter()
        .filter_map(|bug| {
            let completed = parse_opt(bug.completed_at.as_deref())?;
            let created = parse_timestamp(&bug.created_at)?;
            Some(days_between(created, completed))
        })
        .collect()
}

impl Calculator for BugCalculator<'_> {
    fn categories(&self) -> &'static [&'static str] {
        &[category::BUGS, category::BUGS_BY_PRIORITY, category::BUGS_BY_TEAM]
    }

    fn calculate(&self, snapshot: &Snapshot, today: NaiveDate) -> Vec<MetricRow> {
        let bugs: Vec<&Issue> = snapshot
            .issues
            .iter()
            .filter(|i| self.rules.is_bug(&i.labels))
            .collect();

        let open = bugs.iter().filter(|b| b.is_open()).count();
        let closed = bugs.iter().filter(|b| b.is_completed()).count();
        let created_30d = bugs
            .iter()
            .filter_map(|b| parse_timestamp(&b.created_at))
            .filter(|ts| within_last_days(*ts, today, 30))
            .count();
        let closed_30d = bugs
            .iter()
            .filter_map(|b| parse_opt(b.completed_at.as_deref()))
            .filter(|ts| within_last_days(*ts, today, 30))
            .count();
        let resolution = resolution_days(bugs.iter().copied());

        let mut rows: Vec<MetricRow> = [
            ("total_bugs", bugs.len() as f64),
            ("open_bugs", open as f64),
            ("closed_bugs", closed as f64),
            ("bugs_created_30d", created_30d as f64),
            ("bugs_closed_30d", closed_30d as f64),
            ("avg_resolution_days", round2(mean(&resolution))),
            (
                "bug_ratio",
                round2(percent(bugs.len() as f64, snapshot.issues.len() as f64)),
            ),
        ]
        .into_iter()
        .map(|(metric, value)| MetricRow::new(today, category::BUGS, metric, value))
        .collect();

        let mut by_priority: BTreeMap<&str, usize> = BTreeMap::new();
        for bug in bugs.iter().filter(|b| b.is_open()) {
            *by_priority.entry(bug.priority_name()).or_default() += 1;
        }
        rows.extend(by_priority.into_iter().map(|(priority, count)| {
            MetricRow::new(today, category::BUGS_BY_PRIORITY, priority, count as f64)
        }));

        let mut by_team: BTreeMap<&str, (usize, usize)> = BTreeMap::new();
        for bug in &bugs {
            let entry = by_team.entry(bug.team_name()).or_default();
            entry.0 += 1;
            if bug.is_open() {
                entry.1 += 1;
            }
        }
        for (team, (total, open)) in by_team {
            rows.push(MetricRow::new(
                today,
                category::BUGS_BY_TEAM,
                keys::encode2(team, "total_bugs"),
                total as f64,
            ));
            rows.push(MetricRow::new(
                today,
                category::BUGS_BY_TEAM,
                keys::encode2(team, "open_bugs"),
                open as f64,
            ));
        }

        rows
    }
}
