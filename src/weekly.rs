//! Monday-aligned weekly bucketing.
//!
//! Buckets are keyed by the concrete Monday on or before each date, never
//! by a `(year, week number)` pair, so weeks that straddle a year boundary
//! stay whole.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;

use crate::date_util::week_start;
use crate::metrics::MetricRow;
use crate::stats::{percent, round2};

const LABEL_FORMAT: &str = "%Y-%m-%d";

/// One dated value of a numeric series.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeriesPoint {
    pub date: NaiveDate,
    pub value: f64,
}

impl SeriesPoint {
    pub fn new(date: NaiveDate, value: f64) -> Self {
        Self { date, value }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WeeklySeries {
    pub labels: Vec<String>,
    pub values: Vec<f64>,
}

/// Two series bucketed on the same weeks, with each one's share of the
/// weekly total.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WeeklyPair {
    pub labels: Vec<String>,
    pub names: (String, String),
    pub a_raw: Vec<f64>,
    pub b_raw: Vec<f64>,
    pub a_pct: Vec<f64>,
    pub b_pct: Vec<f64>,
}

pub fn bucket_key(date: NaiveDate) -> NaiveDate {
    week_start(date)
}

fn label(monday: NaiveDate) -> String {
    monday.format(LABEL_FORMAT).to_string()
}

fn bucket(series: &[SeriesPoint]) -> BTreeMap<NaiveDate, f64> {
    let mut buckets = BTreeMap::new();
    for point in series {
        *buckets.entry(bucket_key(point.date)).or_insert(0.0) += point.value;
    }
    buckets
}

/// Sum `series` per week, in chronological order.
pub fn aggregate_single(series: &[SeriesPoint]) -> WeeklySeries {
    let (labels, values) = bucket(series)
        .into_iter()
        .map(|(monday, total)| (label(monday), total))
        .unzip();
    WeeklySeries { labels, values }
}

/// Sum both series per week over the union of their weeks.
pub fn aggregate_pair(a: &[SeriesPoint], b: &[SeriesPoint], names: (&str, &str)) -> WeeklyPair {
    let a = bucket(a);
    let b = bucket(b);
    let mut weeks: Vec<NaiveDate> = a.keys().chain(b.keys()).copied().collect();
    weeks.sort();
    weeks.dedup();

    let mut pair = WeeklyPair {
        names: (names.0.to_string(), names.1.to_string()),
        ..Default::default()
    };
    for monday in weeks {
        let a_raw = a.get(&monday).copied().unwrap_or(0.0);
        let b_raw = b.get(&monday).copied().unwrap_or(0.0);
        let total = a_raw + b_raw;

        pair.labels.push(label(monday));
        pair.a_raw.push(a_raw);
        pair.b_raw.push(b_raw);
        pair.a_pct.push(round2(percent(a_raw, total)));
        pair.b_pct.push(round2(percent(b_raw, total)));
    }
    pair
}

/// Series of the rows whose metric is exactly `metric`.
pub fn series_from_rows<'r>(rows: impl IntoIterator<Item = &'r MetricRow>, metric: &str) -> Vec<SeriesPoint> {
    rows.into_iter()
        .filter(|r| r.metric == metric)
        .map(|r| SeriesPoint::new(r.date, r.value))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn p(y: i32, m: u32, day: u32, value: f64) -> SeriesPoint {
        SeriesPoint::new(d(y, m, day), value)
    }

    #[test]
    fn test_year_boundary_week_stays_whole() {
        let weekly = aggregate_single(&[p(2024, 12, 30, 3.0), p(2025, 1, 2, 4.0)]);
        assert_eq!(weekly.labels, vec!["2024-12-30"]);
        assert_eq!(weekly.values, vec![7.0]);
    }

    #[test]
    fn test_sunday_belongs_to_preceding_monday() {
        assert_eq!(bucket_key(d(2024, 12, 1)), d(2024, 11, 25));
        assert_eq!(bucket_key(d(2024, 12, 2)), d(2024, 12, 2));

        let weekly = aggregate_single(&[p(2024, 12, 1, 1.0), p(2024, 12, 2, 1.0)]);
        assert_eq!(weekly.labels, vec!["2024-11-25", "2024-12-02"]);
    }

    #[test]
    fn test_buckets_sorted_chronologically() {
        let weekly = aggregate_single(&[p(2025, 2, 3, 1.0), p(2025, 1, 6, 2.0), p(2025, 1, 8, 2.0)]);
        assert_eq!(weekly.labels, vec!["2025-01-06", "2025-02-03"]);
        assert_eq!(weekly.values, vec![4.0, 1.0]);
    }

    #[test]
    fn test_aggregate_pair_shares() {
        let pair = aggregate_pair(&[p(2025, 1, 6, 10.0)], &[p(2025, 1, 7, 6.0)], ("created", "completed"));
        assert_eq!(pair.labels, vec!["2025-01-06"]);
        assert_eq!(pair.a_raw, vec![10.0]);
        assert_eq!(pair.b_raw, vec![6.0]);
        assert_eq!(pair.a_pct, vec![62.5]);
        assert_eq!(pair.b_pct, vec![37.5]);
        assert_eq!(pair.names.0, "created");
    }

    #[test]
    fn test_aggregate_pair_zero_total_and_disjoint_weeks() {
        let pair = aggregate_pair(&[p(2025, 1, 6, 0.0)], &[p(2025, 1, 13, 2.0)], ("a", "b"));
        assert_eq!(pair.labels, vec!["2025-01-06", "2025-01-13"]);
        assert_eq!(pair.a_pct, vec![0.0, 0.0]);
        assert_eq!(pair.b_pct, vec![0.0, 100.0]);
        assert_eq!(pair.a_raw, vec![0.0, 0.0]);
    }

    #[test]
    fn test_series_from_rows() {
        let rows = vec![
            MetricRow::new(d(2025, 1, 6), "timeseries", "tickets_created", 2.0),
            MetricRow::new(d(2025, 1, 6), "timeseries", "tickets_completed", 1.0),
        ];
        assert_eq!(series_from_rows(&rows, "tickets_created"), vec![p(2025, 1, 6, 2.0)]);
    }
}
