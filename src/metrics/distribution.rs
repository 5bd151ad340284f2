use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveTime};

use super::types::{category, MetricRow};
use super::Calculator;
use crate::config::Rules;
use crate::date_util::{days_between, parse_timestamp};
use crate::model::{Issue, Snapshot};
use crate::stats::{mean, round2};

/// Status, priority, type, size and assignee histograms plus backlog age.
pub struct DistributionCalculator<'a> {
    rules: &'a Rules,
}

impl<'a> DistributionCalculator<'a> {
    pub fn new(rules: &'a Rules) -> Self {
        Self { rules }
    }
}

fn histogram<'i, I>(today: NaiveDate, category: &str, keys: I) -> Vec<MetricRow>
where
    I: IntoIterator<Item = &'i str>,
{
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for key in keys {
        *counts.entry(key).or_default() += 1;
    }
    counts
        .into_iter()
        .map(|(key, count)| MetricRow::new(today, category, key, count as f64))
        .collect()
}

fn state_label(issue: &Issue) -> &str {
    if issue.state.name.is_empty() {
        &issue.state.kind
    } else {
        &issue.state.name
    }
}

/// Ages in days, as of the start of `today`, of issues in a backlog state.
/// Issues created later on `today` count as age 0.
pub fn backlog_ages(issues: &[Issue], today: NaiveDate) -> Vec<f64> {
    let now = today.and_time(NaiveTime::MIN).and_utc();
    issues
        .iter()
        .filter(|i| i.state.kind == "backlog")
        .filter_map(|i| parse_timestamp(&i.created_at))
        .map(|created| days_between(created, now).max(0.0))
        .collect()
}

impl Calculator for DistributionCalculator<'_> {
    fn categories(&self) -> &'static [&'static str] {
        &[
            category::STATUS_DISTRIBUTION,
            category::PRIORITY_DISTRIBUTION,
            category::TYPE_DISTRIBUTION,
            category::SIZE_DISTRIBUTION,
            category::ASSIGNEE_DISTRIBUTION,
            category::BACKLOG,
        ]
    }

    fn calculate(&self, snapshot: &Snapshot, today: NaiveDate) -> Vec<MetricRow> {
        let issues = &snapshot.issues;
        let open = || issues.iter().filter(|i| i.is_open());

        let mut rows = histogram(today, category::STATUS_DISTRIBUTION, issues.iter().map(state_label));
        rows.extend(histogram(
            today,
            category::PRIORITY_DISTRIBUTION,
            issues.iter().map(Issue::priority_name),
        ));
        rows.extend(histogram(
            today,
            category::TYPE_DISTRIBUTION,
            issues.iter().map(|i| self.rules.classify(i)),
        ));
        rows.extend(histogram(
            today,
            category::SIZE_DISTRIBUTION,
            issues.iter().map(|i| self.rules.size_bucket(i.estimate)),
        ));
        // Workload: open issues only.
        rows.extend(histogram(
            today,
            category::ASSIGNEE_DISTRIBUTION,
            open().map(Issue::assignee_name),
        ));

        let ages = backlog_ages(issues, today);
        let backlog_count = issues.iter().filter(|i| i.state.kind == "backlog").count();
        rows.push(MetricRow::new(
            today,
            category::BACKLOG,
            "avg_backlog_age_days",
            round2(mean(&ages)),
        ));
        rows.push(MetricRow::new(
            today,
            category::BACKLOG,
            "backlog_count",
            backlog_count as f64,
        ));
        rows
    }
}
