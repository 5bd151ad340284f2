pub mod cycles;
pub mod teams;

pub use cycles::{parse_cycles, CycleRecord};
pub use teams::{match_teams, Combinator, CombinatorPolicy, Recompute, TeamAggregator};

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use serde::Serialize;

use crate::config::TeamPatterns;
use crate::keys;
use crate::metrics::activity::{TICKETS_COMPLETED, TICKETS_CREATED, TRANSITIONS_PREFIX};
use crate::metrics::{category, MetricRow};
use crate::stats::{build_histogram, build_stats, HistogramBucket, PercentileSummary, Stats};
use crate::storage::MetricStore;
use crate::weekly::{aggregate_pair, aggregate_single, series_from_rows, WeeklyPair, WeeklySeries};

/// Boundaries of the cycle completion-rate histogram, in percent.
pub const COMPLETION_RATE_BUCKETS: [f64; 5] = [0.0, 25.0, 50.0, 75.0, 100.0];

#[derive(Debug, Clone, Serialize)]
pub struct UnifiedTeamReport {
    pub name: String,
    pub source_teams: Vec<String>,
    pub cycles: Vec<CycleRecord>,
    pub stats: BTreeMap<String, f64>,
    /// `total_bugs`, `open_bugs` and `bug_mttr_days` across the source teams.
    pub bugs: BTreeMap<String, f64>,
    pub velocity: PercentileSummary,
    pub velocity_stats: Stats,
    pub completion_histogram: Vec<HistogramBucket>,
    pub weekly_tickets: WeeklyPair,
}

/// Presentation-ready aggregates for one metric file.
#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    /// Date of the newest flow snapshot, if any.
    pub generated_for: Option<NaiveDate>,
    pub flow: BTreeMap<String, f64>,
    pub cycle_summary: BTreeMap<String, f64>,
    pub unified_teams: Vec<UnifiedTeamReport>,
    pub weekly_tickets: WeeklyPair,
    pub weekly_transitions: BTreeMap<String, WeeklySeries>,
}

/// Values of the newest snapshot among `rows`: only rows carrying the most
/// recent date are kept.
pub fn latest_values(rows: &[MetricRow]) -> BTreeMap<String, f64> {
    let Some(latest) = rows.iter().map(|r| r.date).max() else {
        return BTreeMap::new();
    };
    rows.iter()
        .filter(|r| r.date == latest)
        .map(|r| (r.metric.clone(), r.value))
        .collect()
}

/// Rows of `rows` carrying the most recent date.
fn latest_rows(rows: &[MetricRow]) -> Vec<&MetricRow> {
    let latest = rows.iter().map(|r| r.date).max();
    rows.iter().filter(|r| Some(r.date) == latest).collect()
}

/// Team names present in the cycle rows and the `team:metric` categories.
pub fn observed_teams(store: &MetricStore) -> BTreeSet<String> {
    let cycle_teams = store
        .metrics_for(category::CYCLE)
        .iter()
        .filter_map(|r| keys::decode3(&r.metric).map(|(team, _, _)| team));
    let keyed_teams = [
        category::TEAM,
        category::BUGS_BY_TEAM,
        category::TEAM_MTTR,
        category::TIMESERIES_BY_TEAM,
    ]
    .into_iter()
    .flat_map(|cat| store.metrics_for(cat))
    .filter_map(|r| keys::decode2(&r.metric).map(|(team, _)| team));
    cycle_teams.chain(keyed_teams).map(str::to_string).collect()
}

/// Observed teams matched by each unified team of `source`.
pub fn resolve_teams(patterns: &TeamPatterns, source: &str, observed: &BTreeSet<String>) -> BTreeMap<String, BTreeSet<String>> {
    patterns
        .unified_names(source)
        .into_iter()
        .map(|unified| {
            let matched = match_teams(patterns.patterns_for(source, unified), observed.iter().map(String::as_str));
            if matched.is_empty() {
                log::info!("Unified team '{unified}' matched no {source} teams");
            }
            (unified.to_string(), matched)
        })
        .collect()
}

/// Builds a [`Dashboard`] from stored metric rows.
pub struct ReportBuilder<'a> {
    patterns: &'a TeamPatterns,
    source: &'a str,
    since: Option<NaiveDate>,
    aggregator: TeamAggregator,
}

impl<'a> ReportBuilder<'a> {
    pub fn new(patterns: &'a TeamPatterns, source: &'a str) -> Self {
        Self {
            patterns,
            source,
            since: None,
            aggregator: TeamAggregator::default(),
        }
    }

    /// Only use time-series rows dated on or after `since`.
    pub fn since(mut self, since: Option<NaiveDate>) -> Self {
        self.since = since;
        self
    }

    pub fn build(&self, store: &MetricStore) -> Dashboard {
        let flow_rows = store.metrics_for(category::FLOW);
        let cycles = parse_cycles(store.metrics_for(category::CYCLE), &self.aggregator.registry);
        let inputs = TeamInputs {
            cycles: &cycles,
            stats: latest_rows(store.metrics_for(category::TEAM)),
            bugs: latest_rows(store.metrics_for(category::BUGS_BY_TEAM))
                .into_iter()
                .chain(latest_rows(store.metrics_for(category::TEAM_MTTR)))
                .collect(),
            timeseries: store
                .metrics_for(category::TIMESERIES_BY_TEAM)
                .iter()
                .filter(|r| self.since.map_or(true, |s| r.date >= s))
                .collect(),
        };

        let observed = observed_teams(store);
        let unified_teams = resolve_teams(self.patterns, self.source, &observed)
            .into_iter()
            .map(|(name, sources)| self.unified_team(name, &sources, &inputs))
            .collect();

        let created = series_from_rows(store.timeseries_for(TICKETS_CREATED, self.since), TICKETS_CREATED);
        let completed = series_from_rows(store.timeseries_for(TICKETS_COMPLETED, self.since), TICKETS_COMPLETED);

        let transition_rows = store.timeseries_for(TRANSITIONS_PREFIX, self.since);
        let transition_names: BTreeSet<&str> = transition_rows.iter().map(|r| r.metric.as_str()).collect();
        let weekly_transitions = transition_names
            .into_iter()
            .map(|name| {
                let series = series_from_rows(transition_rows.iter().copied(), name);
                (name.to_string(), aggregate_single(&series))
            })
            .collect();

        Dashboard {
            generated_for: flow_rows.iter().map(|r| r.date).max(),
            flow: latest_values(flow_rows),
            cycle_summary: latest_values(store.metrics_for(category::CYCLE_SUMMARY)),
            unified_teams,
            weekly_tickets: aggregate_pair(&created, &completed, (TICKETS_CREATED, TICKETS_COMPLETED)),
            weekly_transitions,
        }
    }

    fn unified_team(&self, name: String, sources: &BTreeSet<String>, inputs: &TeamInputs<'_>) -> UnifiedTeamReport {
        let rolled = self.aggregator.rollup_cycles(&name, sources, inputs.cycles);
        let velocities: Vec<f64> = rolled.iter().filter_map(|c| c.velocity).collect();
        let rates: Vec<f64> = rolled.iter().filter_map(|c| c.completion_rate).collect();

        let series = self
            .aggregator
            .rollup_timeseries(sources, inputs.timeseries.iter().copied());
        let created = series_from_rows(&series, TICKETS_CREATED);
        let completed = series_from_rows(&series, TICKETS_COMPLETED);

        UnifiedTeamReport {
            source_teams: sources.iter().cloned().collect(),
            stats: self.aggregator.rollup_team_stats(sources, inputs.stats.iter().copied()),
            bugs: self.aggregator.rollup_team_stats(sources, inputs.bugs.iter().copied()),
            velocity: PercentileSummary::from_values(&velocities),
            velocity_stats: build_stats(&velocities, 2),
            completion_histogram: build_histogram(&rates, &COMPLETION_RATE_BUCKETS),
            weekly_tickets: aggregate_pair(&created, &completed, (TICKETS_CREATED, TICKETS_COMPLETED)),
            cycles: rolled,
            name,
        }
    }
}

/// Per-team rows shared by every unified team of one report.
struct TeamInputs<'s> {
    cycles: &'s [CycleRecord],
    /// Latest `team` snapshot.
    stats: Vec<&'s MetricRow>,
    /// Latest `bugs_by_team` and `team_mttr` snapshots.
    bugs: Vec<&'s MetricRow>,
    timeseries: Vec<&'s MetricRow>,
}
