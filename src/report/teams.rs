//! Team-name matching and the rollup of several source teams into one
//! unified team.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use wildmatch::WildMatchPattern;

use super::cycles::CycleRecord;
use crate::keys::{self, MetricRegistry};
use crate::metrics::{category, CycleStatus, MetricRow};
use crate::stats::{mean, percent, round2, safe_div};

pub type TeamPattern = WildMatchPattern<'*', '?'>;

/// Resolve configured patterns against the team names seen in the data.
///
/// A pattern matches a name when the two are equal ignoring case or, for
/// patterns containing `*`, when the case-insensitive glob matches. Results
/// are unioned; no match is an empty set.
pub fn match_teams<'t, S, I>(patterns: &[S], available: I) -> BTreeSet<String>
where
    S: AsRef<str>,
    I: IntoIterator<Item = &'t str>,
    I::IntoIter: Clone,
{
    let available = available.into_iter();
    let mut matched = BTreeSet::new();

    for pattern in patterns {
        let pattern = pattern.as_ref();
        let lowered = pattern.to_lowercase();
        let glob = pattern.contains('*').then(|| TeamPattern::new_case_insensitive(pattern));
        for team in available.clone() {
            let exact = team.to_lowercase() == lowered;
            if exact || glob.as_ref().is_some_and(|g| g.matches(team)) {
                matched.insert(team.to_string());
            }
        }
    }
    matched
}

/// Ratios rebuilt from summed components.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recompute {
    /// `completed_issues / total_issues * 100`
    CompletionRate,
    /// `(final_scope - initial_scope) / initial_scope * 100`
    ScopeChange,
    /// `completed_issues / duration_days`
    TicketsPerDay,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Combinator {
    Sum,
    Average,
    Recompute(Recompute),
}

/// How each metric combines across teams, chosen by the first table entry
/// whose substring occurs in the metric name. Unlisted metrics are summed.
#[derive(Debug, Clone)]
pub struct CombinatorPolicy {
    table: Vec<(&'static str, Combinator)>,
}

impl Default for CombinatorPolicy {
    fn default() -> Self {
        let average = Combinator::Average;
        Self {
            table: vec![
                ("tickets_per_day", Combinator::Recompute(Recompute::TicketsPerDay)),
                // Daily counters, whatever state or metric name they embed.
                ("tickets_", Combinator::Sum),
                ("transitions_to_", Combinator::Sum),
                ("completion_rate", Combinator::Recompute(Recompute::CompletionRate)),
                ("progress", Combinator::Recompute(Recompute::CompletionRate)),
                ("scope_change", Combinator::Recompute(Recompute::ScopeChange)),
                ("lead_time", average),
                ("cycle_time", average),
                ("mttr", average),
                ("time", average),
                ("duration", average),
                ("avg_", average),
                ("ratio", average),
            ],
        }
    }
}

impl CombinatorPolicy {
    pub fn combinator(&self, metric: &str) -> Combinator {
        self.table
            .iter()
            .find(|(needle, _)| metric.contains(needle))
            .map_or(Combinator::Sum, |(_, c)| *c)
    }

    /// Combine per-team metric maps into one.
    ///
    /// Sums and averages run first (an average only over the maps that
    /// carry the metric); recomputed ratios are then derived from the
    /// combined components and never from the per-team ratios.
    pub fn combine(&self, maps: &[BTreeMap<String, f64>]) -> BTreeMap<String, f64> {
        let names: BTreeSet<&String> = maps.iter().flat_map(|m| m.keys()).collect();
        let mut combined = BTreeMap::new();
        let mut deferred = Vec::new();

        for name in names {
            let values: Vec<f64> = maps.iter().filter_map(|m| m.get(name).copied()).collect();
            match self.combinator(name) {
                Combinator::Sum => {
                    combined.insert(name.clone(), round2(values.iter().sum()));
                }
                Combinator::Average => {
                    combined.insert(name.clone(), round2(mean(&values)));
                }
                Combinator::Recompute(how) => deferred.push((name.clone(), how)),
            }
        }

        let get = |combined: &BTreeMap<String, f64>, key: &str| combined.get(key).copied().unwrap_or(0.0);
        for (name, how) in deferred {
            let value = match how {
                Recompute::CompletionRate => percent(
                    get(&combined, "completed_issues"),
                    get(&combined, "total_issues"),
                ),
                Recompute::ScopeChange => {
                    let initial = get(&combined, "initial_scope");
                    percent(get(&combined, "final_scope") - initial, initial)
                }
                // Durations are whole days once stored.
                Recompute::TicketsPerDay => safe_div(
                    get(&combined, "completed_issues"),
                    get(&combined, "duration_days").round(),
                ),
            };
            combined.insert(name, round2(value));
        }
        combined
    }
}

/// Status of a rolled-up cycle: active if any source cycle is, else past,
/// else upcoming, else completed.
fn combine_status(statuses: impl IntoIterator<Item = CycleStatus>) -> Option<CycleStatus> {
    const PRECEDENCE: [CycleStatus; 4] = [
        CycleStatus::Active,
        CycleStatus::Past,
        CycleStatus::Upcoming,
        CycleStatus::Completed,
    ];
    let seen: BTreeSet<CycleStatus> = statuses.into_iter().collect();
    PRECEDENCE.into_iter().find(|s| seen.contains(s))
}

/// Merges source-team records into synthetic unified-team records.
#[derive(Debug, Clone, Default)]
pub struct TeamAggregator {
    pub policy: CombinatorPolicy,
    pub registry: MetricRegistry,
}

impl TeamAggregator {
    /// One synthetic record for `unified` from the `records` belonging to
    /// `sources`. The name and date come from the earliest source record.
    /// `None` when no record belongs to `sources`.
    pub fn aggregate(&self, unified: &str, sources: &BTreeSet<String>, records: &[CycleRecord]) -> Option<CycleRecord> {
        let own: Vec<&CycleRecord> = records.iter().filter(|r| sources.contains(&r.team)).collect();
        let first = own.iter().min_by_key(|r| r.date)?;

        let maps: Vec<BTreeMap<String, f64>> = own.iter().map(|r| r.numeric_fields()).collect();
        let mut synthetic = CycleRecord::new(unified, first.name.clone(), first.date);
        synthetic.apply_fields(&self.policy.combine(&maps), &self.registry);
        synthetic.status = combine_status(own.iter().filter_map(|r| r.status));
        Some(synthetic)
    }

    /// Group the source teams' cycles by cycle name and aggregate each
    /// group, ordered by date.
    pub fn rollup_cycles(&self, unified: &str, sources: &BTreeSet<String>, records: &[CycleRecord]) -> Vec<CycleRecord> {
        let mut by_name: BTreeMap<&str, Vec<CycleRecord>> = BTreeMap::new();
        for record in records.iter().filter(|r| sources.contains(&r.team)) {
            by_name.entry(&record.name).or_default().push(record.clone());
        }

        let mut rolled: Vec<CycleRecord> = by_name
            .values()
            .filter_map(|group| self.aggregate(unified, sources, group))
            .collect();
        rolled.sort_by_key(|r| r.date);
        rolled
    }

    /// Combine the `team:stat` rows of the source teams into one map.
    pub fn rollup_team_stats<'r>(
        &self,
        sources: &BTreeSet<String>,
        rows: impl IntoIterator<Item = &'r MetricRow>,
    ) -> BTreeMap<String, f64> {
        let mut per_team: BTreeMap<&str, BTreeMap<String, f64>> = BTreeMap::new();
        for row in rows {
            let Some((team, stat)) = keys::decode2(&row.metric) else {
                log::debug!("Dropping team row with malformed key '{}'", row.metric);
                continue;
            };
            if sources.contains(team) {
                per_team.entry(team).or_default().insert(stat.to_string(), row.value);
            }
        }
        let maps: Vec<BTreeMap<String, f64>> = per_team.into_values().collect();
        self.policy.combine(&maps)
    }

    /// Combine `team:metric` daily rows of the source teams day by day.
    /// The result is plain `timeseries` rows for the unified team.
    pub fn rollup_timeseries<'r>(
        &self,
        sources: &BTreeSet<String>,
        rows: impl IntoIterator<Item = &'r MetricRow>,
    ) -> Vec<MetricRow> {
        let mut by_day: BTreeMap<NaiveDate, BTreeMap<&str, BTreeMap<String, f64>>> = BTreeMap::new();
        for row in rows {
            let Some((team, metric)) = keys::decode2(&row.metric) else {
                log::debug!("Dropping timeseries row with malformed key '{}'", row.metric);
                continue;
            };
            if sources.contains(team) {
                *by_day
                    .entry(row.date)
                    .or_default()
                    .entry(team)
                    .or_default()
                    .entry(metric.to_string())
                    .or_default() += row.value;
            }
        }

        by_day
            .into_iter()
            .flat_map(|(date, per_team)| {
                let maps: Vec<BTreeMap<String, f64>> = per_team.into_values().collect();
                self.policy
                    .combine(&maps)
                    .into_iter()
                    .map(move |(metric, value)| MetricRow::new(date, category::TIMESERIES, metric, value))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn set(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn record(team: &str, name: &str, total: i64, completed: i64) -> CycleRecord {
        let mut r = CycleRecord::new(team, name, d(2025, 1, 6));
        r.total_issues = Some(total);
        r.completed_issues = Some(completed);
        r.completion_rate = Some(round2(percent(completed as f64, total as f64)));
        r
    }

    #[test]
    fn test_match_glob() {
        let teams = ["Team A", "Team B", "Other"];
        assert_eq!(match_teams(&["Team *"], teams), set(&["Team A", "Team B"]));
    }

    #[test]
    fn test_match_exact_is_case_insensitive() {
        let teams = ["Platform", "platform-infra", "Mobile"];
        assert_eq!(match_teams(&["PLATFORM"], teams), set(&["Platform"]));
        assert_eq!(match_teams(&["platform*", "mobile"], teams), set(&["Platform", "platform-infra", "Mobile"]));
    }

    #[test]
    fn test_match_nothing_is_empty() {
        assert!(match_teams(&["Nope", "X*"], ["Team A"]).is_empty());
        assert!(match_teams::<&str, _>(&[], ["Team A"]).is_empty());
    }

    #[test]
    fn test_policy_table() {
        let policy = CombinatorPolicy::default();
        assert_eq!(policy.combinator("completion_rate"), Combinator::Recompute(Recompute::CompletionRate));
        assert_eq!(policy.combinator("progress"), Combinator::Recompute(Recompute::CompletionRate));
        assert_eq!(policy.combinator("scope_change"), Combinator::Recompute(Recompute::ScopeChange));
        assert_eq!(policy.combinator("avg_lead_time_days"), Combinator::Average);
        assert_eq!(policy.combinator("duration_days"), Combinator::Average);
        assert_eq!(policy.combinator("bug_mttr_days"), Combinator::Average);
        assert_eq!(policy.combinator("tickets_created_2025"), Combinator::Sum);
        assert_eq!(policy.combinator("tickets_per_day"), Combinator::Recompute(Recompute::TicketsPerDay));
        assert_eq!(policy.combinator("velocity"), Combinator::Sum);
    }

    #[test]
    fn test_completion_rate_recomputed_not_averaged() {
        let records = vec![record("A", "Sprint 1", 2, 1), record("B", "Sprint 1", 100, 100)];
        let rolled = TeamAggregator::default()
            .aggregate("Unified", &set(&["A", "B"]), &records)
            .unwrap();

        assert_eq!(rolled.team, "Unified");
        assert_eq!(rolled.total_issues, Some(102));
        assert_eq!(rolled.completed_issues, Some(101));
        assert_eq!(rolled.completion_rate, Some(99.02));
    }

    #[test]
    fn test_scope_change_and_averages() {
        let mut a = record("A", "S", 10, 5);
        a.initial_scope = Some(10.0);
        a.final_scope = Some(20.0);
        a.scope_change = Some(100.0);
        a.duration_days = Some(14);
        a.tickets_per_day = Some(0.36);
        a.status = Some(CycleStatus::Completed);
        let mut b = record("B", "S", 10, 5);
        b.initial_scope = Some(30.0);
        b.final_scope = Some(30.0);
        b.scope_change = Some(0.0);
        b.duration_days = Some(10);
        b.tickets_per_day = Some(0.5);
        b.status = Some(CycleStatus::Active);

        let rolled = TeamAggregator::default()
            .aggregate("U", &set(&["A", "B"]), &[a, b])
            .unwrap();
        // (50 - 40) / 40
        assert_eq!(rolled.scope_change, Some(25.0));
        assert_eq!(rolled.duration_days, Some(12));
        // 10 completed over 12 days
        assert_eq!(rolled.tickets_per_day, Some(0.83));
        assert_eq!(rolled.status, Some(CycleStatus::Active));
    }

    #[test]
    fn test_no_sources_no_record() {
        let records = vec![record("A", "S", 1, 1)];
        assert!(TeamAggregator::default().aggregate("U", &set(&[]), &records).is_none());
    }

    #[test]
    fn test_rollup_cycles_groups_by_name() {
        let records = vec![
            record("A", "Sprint 1", 4, 2),
            record("B", "Sprint 1", 4, 4),
            record("A", "Sprint 2", 2, 0),
            record("C", "Sprint 1", 50, 0),
        ];
        let rolled = TeamAggregator::default().rollup_cycles("U", &set(&["A", "B"]), &records);
        assert_eq!(rolled.len(), 2);
        let sprint1 = rolled.iter().find(|r| r.name == "Sprint 1").unwrap();
        assert_eq!(sprint1.total_issues, Some(8));
        assert_eq!(sprint1.completion_rate, Some(75.0));
    }

    #[test]
    fn test_rollup_team_stats() {
        let row = |key: &str, value: f64| MetricRow::new(d(2025, 1, 6), "team", key, value);
        let rows = vec![
            row("A:total_issues", 2.0),
            row("A:completed_issues", 1.0),
            row("A:completion_rate", 50.0),
            row("A:avg_blocked_time_hours", 4.0),
            row("B:total_issues", 100.0),
            row("B:completed_issues", 100.0),
            row("B:completion_rate", 100.0),
            row("B:avg_blocked_time_hours", 8.0),
            row("C:total_issues", 7.0),
            row("malformed", 1.0),
        ];
        let stats = TeamAggregator::default().rollup_team_stats(&set(&["A", "B"]), &rows);
        assert_eq!(stats["total_issues"], 102.0);
        assert_eq!(stats["completion_rate"], 99.02);
        assert_eq!(stats["avg_blocked_time_hours"], 6.0);
    }

    #[test]
    fn test_state_counters_are_summed() {
        let policy = CombinatorPolicy::default();
        assert_eq!(policy.combinator("transitions_to_in_progress"), Combinator::Sum);
        assert_eq!(policy.combinator("transitions_to_waiting_time"), Combinator::Sum);
        assert_eq!(policy.combinator("tickets_completed"), Combinator::Sum);

        let map = |v: f64| -> BTreeMap<String, f64> {
            [("transitions_to_in_progress".to_string(), v)].into_iter().collect()
        };
        let combined = policy.combine(&[map(3.0), map(4.0)]);
        assert_eq!(combined["transitions_to_in_progress"], 7.0);
    }

    #[test]
    fn test_tickets_per_day_uses_stored_duration() {
        let mut a = record("A", "S", 10, 10);
        a.duration_days = Some(14);
        a.tickets_per_day = Some(0.71);
        let mut b = record("B", "S", 10, 3);
        b.duration_days = Some(11);
        b.tickets_per_day = Some(0.27);

        let rolled = TeamAggregator::default()
            .aggregate("U", &set(&["A", "B"]), &[a, b])
            .unwrap();
        // Mean duration 12.5 is stored as 13; 13 completed over 13 days.
        assert_eq!(rolled.duration_days, Some(13));
        assert_eq!(rolled.tickets_per_day, Some(1.0));
    }

    #[test]
    fn test_rollup_bug_rows() {
        let row = |key: &str, value: f64| MetricRow::new(d(2025, 1, 6), "bugs_by_team", key, value);
        let rows = vec![
            row("A:total_bugs", 3.0),
            row("A:open_bugs", 1.0),
            row("A:bug_mttr_days", 2.0),
            row("B:total_bugs", 5.0),
            row("B:open_bugs", 0.0),
            row("B:bug_mttr_days", 4.0),
            row("C:total_bugs", 9.0),
        ];
        let bugs = TeamAggregator::default().rollup_team_stats(&set(&["A", "B"]), &rows);
        assert_eq!(bugs["total_bugs"], 8.0);
        assert_eq!(bugs["open_bugs"], 1.0);
        assert_eq!(bugs["bug_mttr_days"], 3.0);
    }

    #[test]
    fn test_rollup_timeseries_sums_per_day() {
        let row = |day: u32, key: &str, value: f64| MetricRow::new(d(2025, 1, day), "timeseries_by_team", key, value);
        let rows = vec![
            row(6, "A:tickets_created", 2.0),
            row(6, "B:tickets_created", 3.0),
            row(6, "B:transitions_to_in_progress", 1.0),
            row(7, "A:tickets_created", 1.0),
            row(7, "C:tickets_created", 40.0),
            row(7, "broken", 1.0),
        ];
        let series = TeamAggregator::default().rollup_timeseries(&set(&["A", "B"]), &rows);

        let value = |day: u32, metric: &str| {
            series
                .iter()
                .find(|r| r.date == d(2025, 1, day) && r.metric == metric)
                .map(|r| r.value)
        };
        assert_eq!(series.len(), 3);
        assert!(series.iter().all(|r| r.category == category::TIMESERIES));
        assert_eq!(value(6, "tickets_created"), Some(5.0));
        assert_eq!(value(6, "transitions_to_in_progress"), Some(1.0));
        assert_eq!(value(7, "tickets_created"), Some(1.0));
    }
}
