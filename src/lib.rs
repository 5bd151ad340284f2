pub mod config;
pub mod date_util;
pub mod error;
pub mod keys;
pub mod metrics;
pub mod model;
pub mod report;
pub mod stats;
pub mod storage;
pub mod weekly;

pub use config::{Config, Rules, TeamPatterns};
pub use error::{Error, Result};
pub use metrics::{Calculator, CycleStatus, MetricRow};
pub use model::{Cycle, Issue, Snapshot};
pub use report::{CycleRecord, Dashboard, ReportBuilder, TeamAggregator};
pub use storage::MetricStore;

use chrono::NaiveDate;

/// Main entry point: runs the calculators over a snapshot and builds
/// dashboards from stored metric rows.
pub struct FlowMetrics {
    rules: Rules,
}

impl FlowMetrics {
    pub fn new(rules: Rules) -> Self {
        Self { rules }
    }

    /// Build from a loaded configuration, compiling its patterns.
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self::new(config.compile()?))
    }

    /// Every metric row for `snapshot` as of `today`.
    pub fn calculate(&self, snapshot: &Snapshot, today: NaiveDate) -> Vec<MetricRow> {
        metrics::calculate_all(&self.rules, snapshot, today)
    }

    /// Dashboard for `store`, rolling teams up with the `source` patterns
    /// and limiting time series to rows on or after `since`.
    pub fn build_report(
        &self,
        store: &MetricStore,
        patterns: &TeamPatterns,
        source: &str,
        since: Option<NaiveDate>,
    ) -> Dashboard {
        ReportBuilder::new(patterns, source).since(since).build(store)
    }
}

impl Default for FlowMetrics {
    fn default() -> Self {
        Self::new(Rules::default())
    }
}
