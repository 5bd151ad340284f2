use chrono::{DateTime, Utc};

use crate::config::Rules;
use crate::date_util::{days_between, hours_between, parse_timestamp};
use crate::model::HistoryEvent;

/// A closed stay in a target state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interval {
    pub entered: DateTime<Utc>,
    pub exited: DateTime<Utc>,
}

/// Scan an issue's history for stays in states matching `is_target`.
///
/// Events are ordered by timestamp (unparseable ones are skipped). A single
/// entry time is tracked: an event moving *into* a target state records it
/// when none is pending; otherwise an event moving *out of* a target state
/// closes the pending entry. An entry that never exits is dropped.
pub fn scan_intervals<F>(history: &[HistoryEvent], is_target: F) -> Vec<Interval>
where
    F: Fn(&str) -> bool,
{
    let mut events: Vec<(DateTime<Utc>, &HistoryEvent)> = history
        .iter()
        .filter_map(|e| match parse_timestamp(&e.created_at) {
            Some(ts) => Some((ts, e)),
            None => {
                log::debug!("Skipping history event with bad timestamp '{}'", e.created_at);
                None
            }
        })
        .collect();
    events.sort_by_key(|(ts, _)| *ts);

    let mut entered: Option<DateTime<Utc>> = None;
    let mut intervals = Vec::new();

    for (ts, event) in events {
        let into_target = event.to_state.as_ref().is_some_and(|s| is_target(&s.name));
        let out_of_target = event.from_state.as_ref().is_some_and(|s| is_target(&s.name));

        if into_target && entered.is_none() {
            entered = Some(ts);
        } else if out_of_target {
            if let Some(start) = entered.take() {
                intervals.push(Interval {
                    entered: start,
                    exited: ts,
                });
            }
        }
    }

    intervals
}

/// Hours spent in blocked states, one entry per closed stay.
pub fn blocked_hours(history: &[HistoryEvent], rules: &Rules) -> Vec<f64> {
    scan_intervals(history, |name| rules.blocked_state.is_match(name))
        .iter()
        .map(|i| hours_between(i.entered, i.exited))
        .collect()
}

/// Days spent in review states, one entry per closed stay.
pub fn review_days(history: &[HistoryEvent], rules: &Rules) -> Vec<f64> {
    scan_intervals(history, |name| rules.review_state.is_match(name))
        .iter()
        .map(|i| days_between(i.entered, i.exited))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::WorkflowState;

    fn state(name: &str) -> Option<WorkflowState> {
        Some(WorkflowState {
            name: name.to_string(),
            kind: "started".to_string(),
        })
    }

    fn event(at: &str, from: &str, to: &str) -> HistoryEvent {
        HistoryEvent {
            created_at: at.to_string(),
            from_state: if from.is_empty() { None } else { state(from) },
            to_state: if to.is_empty() { None } else { state(to) },
        }
    }

    #[test]
    fn test_blocked_enter_and_exit() {
        let history = vec![
            event("2025-01-01T08:00:00Z", "In Progress", "Blocked"),
            event("2025-01-01T12:00:00Z", "Blocked", "In Progress"),
        ];
        assert_eq!(blocked_hours(&history, &Rules::default()), vec![4.0]);
    }

    #[test]
    fn test_unmatched_entry_is_dropped() {
        let history = vec![event("2025-01-01T08:00:00Z", "In Progress", "Blocked")];
        assert!(blocked_hours(&history, &Rules::default()).is_empty());
    }

    #[test]
    fn test_events_sorted_before_scan() {
        let history = vec![
            event("2025-01-01T12:00:00Z", "Blocked", "In Progress"),
            event("2025-01-01T08:00:00Z", "In Progress", "Blocked"),
        ];
        assert_eq!(blocked_hours(&history, &Rules::default()), vec![4.0]);
    }

    #[test]
    fn test_second_entry_does_not_reset_pending() {
        let history = vec![
            event("2025-01-01T00:00:00Z", "Todo", "Blocked"),
            event("2025-01-01T02:00:00Z", "", "Blocked"),
            event("2025-01-01T06:00:00Z", "Blocked", "Done"),
        ];
        assert_eq!(blocked_hours(&history, &Rules::default()), vec![6.0]);
    }

    #[test]
    fn test_multiple_stays() {
        let history = vec![
            event("2025-01-01T00:00:00Z", "Todo", "Blocked"),
            event("2025-01-01T01:00:00Z", "Blocked", "In Progress"),
            event("2025-01-02T00:00:00Z", "In Progress", "Blocked"),
            event("2025-01-02T03:00:00Z", "Blocked", "In Progress"),
        ];
        assert_eq!(blocked_hours(&history, &Rules::default()), vec![1.0, 3.0]);
    }

    #[test]
    fn test_exit_without_entry_ignored() {
        let history = vec![event("2025-01-01T00:00:00Z", "Blocked", "Todo")];
        assert!(blocked_hours(&history, &Rules::default()).is_empty());
    }

    #[test]
    fn test_review_days() {
        let history = vec![
            event("2025-01-01T00:00:00Z", "In Progress", "In Review"),
            event("2025-01-02T12:00:00Z", "In Review", "Done"),
        ];
        assert_eq!(review_days(&history, &Rules::default()), vec![1.5]);
    }

    #[test]
    fn test_bad_timestamp_skipped() {
        let history = vec![
            event("not a date", "Todo", "Blocked"),
            event("2025-01-01T00:00:00Z", "Blocked", "Todo"),
        ];
        assert!(blocked_hours(&history, &Rules::default()).is_empty());
    }
}
