use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;

use crate::keys::{self, FieldValue, MetricRegistry};
use crate::metrics::{CycleStatus, MetricRow};

/// A cycle reassembled from its `team:cycle:metric` rows. Fields are `None`
/// when no row for them was found.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CycleRecord {
    pub team: String,
    pub name: String,
    pub date: NaiveDate,
    pub total_issues: Option<i64>,
    pub completed_issues: Option<i64>,
    pub bug_count: Option<i64>,
    pub velocity: Option<f64>,
    pub planned_points: Option<f64>,
    pub completion_rate: Option<f64>,
    pub carryover: Option<i64>,
    pub progress: Option<f64>,
    pub duration_days: Option<i64>,
    pub tickets_per_day: Option<f64>,
    pub assignee_count: Option<i64>,
    pub status: Option<CycleStatus>,
    pub scope_change: Option<f64>,
    pub initial_scope: Option<f64>,
    pub final_scope: Option<f64>,
}

impl CycleRecord {
    pub fn new(team: impl Into<String>, name: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            team: team.into(),
            name: name.into(),
            date,
            total_issues: None,
            completed_issues: None,
            bug_count: None,
            velocity: None,
            planned_points: None,
            completion_rate: None,
            carryover: None,
            progress: None,
            duration_days: None,
            tickets_per_day: None,
            assignee_count: None,
            status: None,
            scope_change: None,
            initial_scope: None,
            final_scope: None,
        }
    }

    /// Store a parsed value. Returns false when `metric` is not a field of
    /// the record or the value has the wrong shape.
    pub fn set(&mut self, metric: &str, value: FieldValue) -> bool {
        use FieldValue::*;
        match (metric, value) {
            ("total_issues", Integer(v)) => self.total_issues = Some(v),
            ("completed_issues", Integer(v)) => self.completed_issues = Some(v),
            ("bug_count", Integer(v)) => self.bug_count = Some(v),
            ("velocity", Float(v)) => self.velocity = Some(v),
            ("planned_points", Float(v)) => self.planned_points = Some(v),
            ("completion_rate", Float(v)) => self.completion_rate = Some(v),
            ("carryover", Integer(v)) => self.carryover = Some(v),
            ("progress", Float(v)) => self.progress = Some(v),
            ("duration_days", Integer(v)) => self.duration_days = Some(v),
            ("tickets_per_day", Float(v)) => self.tickets_per_day = Some(v),
            ("assignee_count", Integer(v)) => self.assignee_count = Some(v),
            ("status", Status(s)) => self.status = Some(s),
            ("scope_change", Float(v)) => self.scope_change = Some(v),
            ("initial_scope", Float(v)) => self.initial_scope = Some(v),
            ("final_scope", Float(v)) => self.final_scope = Some(v),
            _ => return false,
        }
        true
    }

    /// Numeric fields that are present, keyed by metric name. The status is
    /// not numeric and is left out.
    pub fn numeric_fields(&self) -> BTreeMap<String, f64> {
        let ints = [
            ("total_issues", self.total_issues),
            ("completed_issues", self.completed_issues),
            ("bug_count", self.bug_count),
            ("carryover", self.carryover),
            ("duration_days", self.duration_days),
            ("assignee_count", self.assignee_count),
        ];
        let floats = [
            ("velocity", self.velocity),
            ("planned_points", self.planned_points),
            ("completion_rate", self.completion_rate),
            ("progress", self.progress),
            ("tickets_per_day", self.tickets_per_day),
            ("scope_change", self.scope_change),
            ("initial_scope", self.initial_scope),
            ("final_scope", self.final_scope),
        ];

        ints.into_iter()
            .filter_map(|(k, v)| Some((k.to_string(), v? as f64)))
            .chain(floats.into_iter().filter_map(|(k, v)| Some((k.to_string(), v?))))
            .collect()
    }

    /// Fill fields from a combined metric map, parsing each value through
    /// the registry.
    pub fn apply_fields(&mut self, fields: &BTreeMap<String, f64>, registry: &MetricRegistry) {
        for (metric, raw) in fields {
            if let Some(value) = registry.parse(metric, *raw) {
                self.set(metric, value);
            }
        }
    }
}

/// Rebuild cycle records from `cycle` rows.
///
/// Rows whose key is not exactly `team:cycle:metric` are dropped, as are
/// metrics the registry does not know. Records are ordered by date, then
/// team and name; a record's date is the earliest of its rows.
pub fn parse_cycles(rows: &[MetricRow], registry: &MetricRegistry) -> Vec<CycleRecord> {
    let mut records: BTreeMap<(&str, &str), CycleRecord> = BTreeMap::new();

    for row in rows {
        let Some((team, name, metric)) = keys::decode3(&row.metric) else {
            log::debug!("Dropping cycle row with malformed key '{}'", row.metric);
            continue;
        };
        let record = records
            .entry((team, name))
            .or_insert_with(|| CycleRecord::new(team, name, row.date));
        record.date = record.date.min(row.date);

        if let Some(value) = registry.parse(metric, row.value) {
            record.set(metric, value);
        }
    }

    let mut records: Vec<CycleRecord> = records.into_values().collect();
    records.sort_by(|a, b| (a.date, &a.team, &a.name).cmp(&(b.date, &b.team, &b.name)));
    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::category;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn row(date: NaiveDate, key: &str, value: f64) -> MetricRow {
        MetricRow::new(date, category::CYCLE, key, value)
    }

    #[test]
    fn test_parse_cycles() {
        let rows = vec![
            row(d(2025, 1, 20), "Platform:Sprint 2:total_issues", 8.0),
            row(d(2025, 1, 6), "Platform:Sprint 1:total_issues", 10.0),
            row(d(2025, 1, 6), "Platform:Sprint 1:completion_rate", 66.666),
            row(d(2025, 1, 6), "Platform:Sprint 1:status", 1.0),
            row(d(2025, 1, 6), "Platform:Sprint 1:mystery_metric", 5.0),
            row(d(2025, 1, 6), "InvalidFormat", 1.0),
            row(d(2025, 1, 6), "Platform:Sprint 1", 1.0),
        ];
        let records = parse_cycles(&rows, &MetricRegistry::default());

        assert_eq!(records.len(), 2);
        let first = &records[0];
        assert_eq!(first.name, "Sprint 1");
        assert_eq!(first.total_issues, Some(10));
        assert_eq!(first.completion_rate, Some(66.67));
        assert_eq!(first.status, Some(CycleStatus::Active));
        // Unknown metrics leave nothing behind.
        assert_eq!(first.numeric_fields().len(), 2);
        assert_eq!(records[1].name, "Sprint 2");
        assert_eq!(records[1].completion_rate, None);
    }

    #[test]
    fn test_unknown_status_code_is_absent() {
        let records = parse_cycles(
            &[row(d(2025, 1, 6), "A:C:status", 9.0)],
            &MetricRegistry::default(),
        );
        assert_eq!(records[0].status, None);
    }

    #[test]
    fn test_set_rejects_wrong_shape() {
        let mut record = CycleRecord::new("A", "C", d(2025, 1, 6));
        assert!(!record.set("total_issues", FieldValue::Float(1.5)));
        assert!(!record.set("nonsense", FieldValue::Integer(1)));
        assert!(record.set("total_issues", FieldValue::Integer(3)));
        assert_eq!(record.total_issues, Some(3));
    }

    #[test]
    fn test_apply_fields() {
        let mut record = CycleRecord::new("Unified", "Sprint 1", d(2025, 1, 6));
        let fields: BTreeMap<String, f64> = [
            ("total_issues".to_string(), 102.0),
            ("completion_rate".to_string(), 99.0196),
        ]
        .into_iter()
        .collect();
        record.apply_fields(&fields, &MetricRegistry::default());
        assert_eq!(record.total_issues, Some(102));
        assert_eq!(record.completion_rate, Some(99.02));
    }
}
