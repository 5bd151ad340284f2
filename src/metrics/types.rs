use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// One analytics fact: the only record that crosses the persistence
/// boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricRow {
    pub date: NaiveDate,
    pub category: String,
    /// Plain metric name or a composite key (see [`crate::keys`]).
    pub metric: String,
    pub value: f64,
}

impl MetricRow {
    pub fn new(date: NaiveDate, category: &str, metric: impl Into<String>, value: f64) -> Self {
        Self {
            date,
            category: category.to_string(),
            metric: metric.into(),
            value,
        }
    }
}

/// Category names written to the `category` column.
pub mod category {
    pub const FLOW: &str = "flow";
    pub const CYCLE_SUMMARY: &str = "cycle_summary";
    pub const CYCLE: &str = "cycle";
    pub const BUGS: &str = "bugs";
    pub const BUGS_BY_PRIORITY: &str = "bugs_by_priority";
    pub const BUGS_BY_TEAM: &str = "bugs_by_team";
    pub const STATUS_DISTRIBUTION: &str = "status_distribution";
    pub const PRIORITY_DISTRIBUTION: &str = "priority_distribution";
    pub const TYPE_DISTRIBUTION: &str = "type_distribution";
    pub const SIZE_DISTRIBUTION: &str = "size_distribution";
    pub const ASSIGNEE_DISTRIBUTION: &str = "assignee_distribution";
    pub const BACKLOG: &str = "backlog";
    pub const TEAM: &str = "team";
    pub const COMPLETION_HEATMAP: &str = "completion_heatmap";
    pub const TIMESERIES: &str = "timeseries";
    pub const TIMESERIES_BY_TEAM: &str = "timeseries_by_team";
    pub const TEAM_MTTR: &str = "team_mttr";
}

/// Lifecycle position of a cycle relative to the reference date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CycleStatus {
    Completed,
    Active,
    Upcoming,
    Past,
}

impl CycleStatus {
    pub fn determine(
        completed: bool,
        starts_at: DateTime<Utc>,
        ends_at: DateTime<Utc>,
        today: NaiveDate,
    ) -> Self {
        if completed {
            CycleStatus::Completed
        } else if today >= starts_at.date_naive() && today <= ends_at.date_naive() {
            CycleStatus::Active
        } else if today < starts_at.date_naive() {
            CycleStatus::Upcoming
        } else {
            CycleStatus::Past
        }
    }

    pub fn code(self) -> i64 {
        match self {
            CycleStatus::Completed => 0,
            CycleStatus::Active => 1,
            CycleStatus::Upcoming => 2,
            CycleStatus::Past => 3,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(CycleStatus::Completed),
            1 => Some(CycleStatus::Active),
            2 => Some(CycleStatus::Upcoming),
            3 => Some(CycleStatus::Past),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CycleStatus::Completed => "completed",
            CycleStatus::Active => "active",
            CycleStatus::Upcoming => "upcoming",
            CycleStatus::Past => "past",
        }
    }
}

impl std::fmt::Display for CycleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_cycle_status_determine() {
        let starts = Utc.with_ymd_and_hms(2025, 1, 6, 0, 0, 0).unwrap();
        let ends = Utc.with_ymd_and_hms(2025, 1, 20, 0, 0, 0).unwrap();

        assert_eq!(
            CycleStatus::determine(true, starts, ends, d(2025, 1, 10)),
            CycleStatus::Completed
        );
        assert_eq!(CycleStatus::determine(false, starts, ends, d(2025, 1, 6)), CycleStatus::Active);
        assert_eq!(CycleStatus::determine(false, starts, ends, d(2025, 1, 20)), CycleStatus::Active);
        assert_eq!(CycleStatus::determine(false, starts, ends, d(2025, 1, 1)), CycleStatus::Upcoming);
        assert_eq!(CycleStatus::determine(false, starts, ends, d(2025, 2, 1)), CycleStatus::Past);
    }

    #[test]
    fn test_cycle_status_code_roundtrip() {
        for status in [
            CycleStatus::Completed,
            CycleStatus::Active,
            CycleStatus::Upcoming,
            CycleStatus::Past,
        ] {
            assert_eq!(CycleStatus::from_code(status.code()), Some(status));
        }
        assert_eq!(CycleStatus::from_code(4), None);
    }
}
