use std::collections::BTreeMap;

use chrono::NaiveDate;

use super::intervals::{blocked_hours, review_days};
use super::types::{category, MetricRow};
use super::Calculator;
use crate::config::Rules;
use crate::date_util::{parse_timestamp, within_last_days};
use crate::keys;
use crate::model::{Issue, Snapshot};
use crate::stats::{mean, percent, round2};

/// Recent completion, WIP, blocked time and review time per team.
pub struct TeamCalculator<'a> {
    rules: &'a Rules,
}

impl<'a> TeamCalculator<'a> {
    pub fn new(rules: &'a Rules) -> Self {
        Self { rules }
    }

    fn team_rows(&self, team: &str, issues: &[&Issue], today: NaiveDate) -> Vec<MetricRow> {
        let recent: Vec<&&Issue> = issues
            .iter()
            .filter(|i| parse_timestamp(&i.created_at).is_some_and(|ts| within_last_days(ts, today, 30)))
            .collect();
        let completed = recent.iter().filter(|i| i.is_completed()).count();
        let wip = issues.iter().filter(|i| i.state.kind == "started").count();

        let blocked: Vec<f64> = issues
            .iter()
            .flat_map(|i| blocked_hours(&i.history, self.rules))
            .collect();
        let review: Vec<f64> = issues
            .iter()
            .flat_map(|i| review_days(&i.history, self.rules))
            .collect();

        [
            ("total_issues", recent.len() as f64),
            ("completed_issues", completed as f64),
            ("completion_rate", round2(percent(completed as f64, recent.len() as f64))),
            ("current_wip", wip as f64),
            ("avg_blocked_time_hours", round2(mean(&blocked))),
            ("avg_review_time_days", round2(mean(&review))),
        ]
        .into_iter()
        .map(|(stat, value)| MetricRow::new(today, category::TEAM, keys::encode2(team, stat), value))
        .collect()
    }
}

impl Calculator for TeamCalculator<'_> {
    fn categories(&self) -> &'static [&'static str] {
        &[category::TEAM]
    }

    fn calculate(&self, snapshot: &Snapshot, today: NaiveDate) -> Vec<MetricRow> {
        let mut by_team: BTreeMap<&str, Vec<&Issue>> = BTreeMap::new();
        for issue in &snapshot.issues {
            by_team.entry(issue.team_name()).or_default().push(issue);
        }

        by_team
            .iter()
            .flat_map(|(team, issues)| self.team_rows(team, issues, today))
            .collect()
    }
}
