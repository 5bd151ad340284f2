pub mod activity;
pub mod bugs;
pub mod cycle;
pub mod distribution;
pub mod flow;
pub mod intervals;
pub mod team;
pub mod types;

pub use activity::ActivityCalculator;
pub use bugs::BugCalculator;
pub use cycle::CycleCalculator;
pub use distribution::DistributionCalculator;
pub use flow::FlowCalculator;
pub use team::TeamCalculator;
pub use types::*;

use chrono::NaiveDate;

use crate::config::Rules;
use crate::model::Snapshot;

/// Turns a snapshot into metric rows.
///
/// Implementations are stateless, never mutate the snapshot, and each one
/// owns a disjoint set of output categories, so they can run in any order.
pub trait Calculator {
    /// Categories written by this calculator.
    fn categories(&self) -> &'static [&'static str];

    fn calculate(&self, snapshot: &Snapshot, today: NaiveDate) -> Vec<MetricRow>;
}

/// Every calculator, in output order.
pub fn calculators(rules: &Rules) -> Vec<Box<dyn Calculator + '_>> {
    vec![
        Box::new(FlowCalculator),
        Box::new(CycleCalculator::new(rules)),
        Box::new(BugCalculator::new(rules)),
        Box::new(DistributionCalculator::new(rules)),
        Box::new(TeamCalculator::new(rules)),
        Box::new(ActivityCalculator::new(rules)),
    ]
}

/// Run every calculator over `snapshot`.
pub fn calculate_all(rules: &Rules, snapshot: &Snapshot, today: NaiveDate) -> Vec<MetricRow> {
    let mut rows = Vec::new();
    for calculator in calculators(rules) {
        let produced = calculator.calculate(snapshot, today);
        log::debug!(
            "{} rows for {}",
            produced.len(),
            calculator.categories().join(", ")
        );
        rows.extend(produced);
    }
    log::info!("Calculated {} metric rows as of {today}", rows.len());
    rows
}
