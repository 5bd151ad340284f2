use std::collections::HashSet;

use chrono::NaiveDate;

use super::types::{category, CycleStatus, MetricRow};
use super::Calculator;
use crate::config::Rules;
use crate::date_util::parse_timestamp;
use crate::keys;
use crate::model::{Cycle, Snapshot};
use crate::stats::{mean, percent, round2, safe_div};

/// Per-cycle figures before they are flattened into rows.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleDetail {
    pub team: String,
    pub name: String,
    pub start_date: NaiveDate,
    pub total_issues: usize,
    pub completed_issues: usize,
    pub bug_count: usize,
    pub velocity: f64,
    pub planned_points: f64,
    pub completion_rate: f64,
    pub carryover: usize,
    pub progress: f64,
    pub duration_days: i64,
    pub tickets_per_day: f64,
    pub assignee_count: usize,
    pub status: CycleStatus,
    pub scope_change: f64,
    /// First and last entries of the scope history, when there is one.
    pub scope: Option<(f64, f64)>,
}

impl CycleDetail {
    /// Derive the detail view of one cycle. `None` when its start or end
    /// timestamp cannot be parsed.
    pub fn from_cycle(cycle: &Cycle, rules: &Rules, today: NaiveDate) -> Option<Self> {
        let (Some(starts_at), Some(ends_at)) = (
            parse_timestamp(&cycle.starts_at),
            parse_timestamp(&cycle.ends_at),
        ) else {
            log::debug!(
                "Skipping cycle '{}' of {}: unparseable start/end",
                cycle.display_name(),
                cycle.team.name
            );
            return None;
        };

        let total_issues = cycle.issues.len();
        let completed: Vec<_> = cycle.issues.iter().filter(|i| i.is_completed()).collect();
        let completed_issues = completed.len();
        let velocity: f64 = completed.iter().map(|i| i.estimate.unwrap_or(0.0)).sum();
        let planned_points: f64 = cycle.issues.iter().map(|i| i.estimate.unwrap_or(0.0)).sum();
        let assignees: HashSet<&str> = cycle
            .issues
            .iter()
            .filter_map(|i| i.assignee.as_ref().map(|a| a.id.as_str()))
            .collect();
        let duration_days = (ends_at - starts_at).num_days();

        let scope = cycle
            .scope_history
            .as_deref()
            .and_then(|h| Some((*h.first()?, *h.last()?)));
        let scope_change = match scope {
            Some((initial, last)) if initial != 0.0 => round2(percent(last - initial, initial)),
            _ => 0.0,
        };

        Some(Self {
            team: cycle.team.name.clone(),
            name: cycle.display_name(),
            start_date: starts_at.date_naive(),
            total_issues,
            completed_issues,
            bug_count: cycle.issues.iter().filter(|i| rules.is_bug(&i.labels)).count(),
            velocity: round2(velocity),
            planned_points: round2(planned_points),
            completion_rate: round2(percent(completed_issues as f64, total_issues as f64)),
            carryover: cycle.uncompleted_issues_upon_close.len(),
            progress: round2(cycle.progress * 100.0),
            duration_days,
            tickets_per_day: round2(safe_div(completed_issues as f64, duration_days as f64)),
            assignee_count: assignees.len(),
            status: CycleStatus::determine(cycle.completed_at.is_some(), starts_at, ends_at, today),
            scope_change,
            scope,
        })
    }

    /// Flatten into `cycle` rows keyed `team:cycle:metric`, dated with the
    /// cycle start.
    pub fn to_rows(&self) -> Vec<MetricRow> {
        let mut values = vec![
            ("total_issues", self.total_issues as f64),
            ("completed_issues", self.completed_issues as f64),
            ("bug_count", self.bug_count as f64),
            ("velocity", self.velocity),
            ("planned_points", self.planned_points),
            ("completion_rate", self.completion_rate),
            ("carryover", self.carryover as f64),
            ("progress", self.progress),
            ("duration_days", self.duration_days as f64),
            ("tickets_per_day", self.tickets_per_day),
            ("assignee_count", self.assignee_count as f64),
            ("status", self.status.code() as f64),
            ("scope_change", self.scope_change),
        ];
        if let Some((initial, last)) = self.scope {
            values.push(("initial_scope", initial));
            values.push(("final_scope", last));
        }

        values
            .into_iter()
            .map(|(metric, value)| {
                MetricRow::new(
                    self.start_date,
                    category::CYCLE,
                    keys::encode(&self.team, &self.name, metric),
                    value,
                )
            })
            .collect()
    }
}

/// Current velocity, commitment accuracy, carryover and per-cycle details.
pub struct CycleCalculator<'a> {
    rules: &'a Rules,
}

impl<'a> CycleCalculator<'a> {
    pub fn new(rules: &'a Rules) -> Self {
        Self { rules }
    }
}

impl Calculator for CycleCalculator<'_> {
    fn categories(&self) -> &'static [&'static str] {
        &[category::CYCLE_SUMMARY, category::CYCLE]
    }

    fn calculate(&self, snapshot: &Snapshot, today: NaiveDate) -> Vec<MetricRow> {
        let details: Vec<CycleDetail> = snapshot
            .cycles
            .iter()
            .filter_map(|c| CycleDetail::from_cycle(c, self.rules, today))
            .collect();

        let current_velocity: f64 = details
            .iter()
            .filter(|d| d.status == CycleStatus::Active)
            .map(|d| d.velocity)
            .sum();

        // Averaged per cycle; a 0-issue cycle counts as 0%.
        let closed: Vec<&Cycle> = snapshot
            .cycles
            .iter()
            .filter(|c| c.completed_at.is_some())
            .collect();
        let accuracies: Vec<f64> = closed
            .iter()
            .map(|c| {
                let done = c.issues.iter().filter(|i| i.is_completed()).count();
                percent(done as f64, c.issues.len() as f64)
            })
            .collect();
        let carryovers: Vec<f64> = closed
            .iter()
            .map(|c| c.uncompleted_issues_upon_close.len() as f64)
            .collect();

        let summary = |metric: &str, value: f64| {
            MetricRow::new(today, category::CYCLE_SUMMARY, metric, value)
        };
        let mut rows = vec![
            summary("current_cycle_velocity", round2(current_velocity)),
            summary("cycle_commitment_accuracy", round2(mean(&accuracies))),
            summary("cycle_carryover_count", round2(mean(&carryovers))),
        ];
        rows.extend(details.iter().flat_map(CycleDetail::to_rows));
        rows
    }
}
