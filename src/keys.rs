//! Composite keys packed into the `metric` column.
//!
//! Two arities share the `:` delimiter: `team:cycle:metric` for the `cycle`
//! category and `team:stat` for per-team categories. There is no escaping,
//! so a team or cycle name containing `:` produces a key with the wrong
//! segment count and the row is dropped when read back. The format is a
//! persisted contract across runs and is kept as is.

use std::collections::HashMap;

use crate::metrics::types::CycleStatus;

pub const DELIMITER: char = ':';

/// Build a 3-part `team:cycle:metric` key.
pub fn encode(team: &str, cycle: &str, metric: &str) -> String {
    warn_on_delimiter(&[team, cycle, metric]);
    format!("{team}{DELIMITER}{cycle}{DELIMITER}{metric}")
}

/// Build a 2-part `team:stat` key.
pub fn encode2(team: &str, stat: &str) -> String {
    warn_on_delimiter(&[team, stat]);
    format!("{team}{DELIMITER}{stat}")
}

/// Split a 3-part key. Any other segment count is rejected.
pub fn decode3(key: &str) -> Option<(&str, &str, &str)> {
    let mut parts = key.split(DELIMITER);
    let decoded = (parts.next()?, parts.next()?, parts.next()?);
    if parts.next().is_some() {
        return None;
    }
    Some(decoded)
}

/// Split a 2-part key. Any other segment count is rejected.
pub fn decode2(key: &str) -> Option<(&str, &str)> {
    let mut parts = key.split(DELIMITER);
    let decoded = (parts.next()?, parts.next()?);
    if parts.next().is_some() {
        return None;
    }
    Some(decoded)
}

fn warn_on_delimiter(parts: &[&str]) {
    if let Some(bad) = parts.iter().find(|p| p.contains(DELIMITER)) {
        log::warn!("Key segment '{bad}' contains '{DELIMITER}'; the row will not decode");
    }
}

/// How a persisted value is turned back into a typed field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Integer,
    /// Float rounded to the given number of decimals.
    Rounded(u32),
    /// Cycle status, persisted as its ordinal.
    Status,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue {
    Integer(i64),
    Float(f64),
    Status(CycleStatus),
}

/// Registry of the metric names a cycle row may carry and how each value
/// parses. Names missing from the registry are ignored by the decoder.
#[derive(Debug, Clone)]
pub struct MetricRegistry {
    kinds: HashMap<&'static str, ValueKind>,
}

impl Default for MetricRegistry {
    fn default() -> Self {
        use ValueKind::*;
        let kinds = [
            ("total_issues", Integer),
            ("completed_issues", Integer),
            ("bug_count", Integer),
            ("velocity", Rounded(2)),
            ("planned_points", Rounded(2)),
            ("completion_rate", Rounded(2)),
            ("carryover", Integer),
            ("progress", Rounded(2)),
            ("duration_days", Integer),
            ("tickets_per_day", Rounded(2)),
            ("assignee_count", Integer),
            ("status", Status),
            ("scope_change", Rounded(2)),
            ("initial_scope", Rounded(2)),
            ("final_scope", Rounded(2)),
        ];
        Self {
            kinds: kinds.into_iter().collect(),
        }
    }
}

impl MetricRegistry {
    pub fn kind(&self, metric: &str) -> Option<ValueKind> {
        self.kinds.get(metric).copied()
    }

    pub fn contains(&self, metric: &str) -> bool {
        self.kinds.contains_key(metric)
    }

    /// Parse a raw value for `metric`; `None` for unknown metrics or an
    /// unknown status ordinal.
    pub fn parse(&self, metric: &str, raw: f64) -> Option<FieldValue> {
        match self.kind(metric)? {
            ValueKind::Integer => Some(FieldValue::Integer(raw.round() as i64)),
            ValueKind::Rounded(decimals) => {
                Some(FieldValue::Float(crate::stats::round_to(raw, decimals)))
            }
            ValueKind::Status => CycleStatus::from_code(raw.round() as i64).map(FieldValue::Status),
        }
    }
}
