use std::collections::BTreeMap;
use std::path::Path;

use chrono::NaiveDate;

use crate::date_util::parse_date;
use crate::error::{Error, Result};
use crate::metrics::{category, MetricRow};

pub const HEADER: [&str; 4] = ["date", "category", "metric", "value"];

/// Render rows as CSV with the fixed `date,category,metric,value` header.
pub fn to_csv(rows: &[MetricRow]) -> String {
    let mut out = HEADER.join(",");
    out.push('\n');
    for row in rows {
        out.push_str(&format!(
            "{},{},{},{}\n",
            row.date.format("%Y-%m-%d"),
            csv_escape(&row.category),
            csv_escape(&row.metric),
            format_value(row.value),
        ));
    }
    out
}

/// Write rows to `path`, creating parent directories as needed.
pub fn write_csv(path: impl AsRef<Path>, rows: &[MetricRow]) -> Result<()> {
    let path = path.as_ref();
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)?;
    }
    std::fs::write(path, to_csv(rows))?;
    log::info!("Wrote {} metric rows to {}", rows.len(), path.display());
    Ok(())
}

/// Parse CSV text produced by [`to_csv`].
///
/// The header must match exactly. Data records that do not have four
/// fields, a valid date, and a numeric value are skipped with a warning.
pub fn parse_csv(text: &str) -> Result<Vec<MetricRow>> {
    let mut records = split_records(text).into_iter();
    let header = records
        .next()
        .ok_or_else(|| Error::MetricFile("empty file".into()))?;
    if header.iter().map(|f| f.trim()).ne(HEADER) {
        return Err(Error::MetricFile(format!(
            "unexpected header '{}', expected '{}'",
            header.join(","),
            HEADER.join(",")
        )));
    }

    let mut rows = Vec::new();
    for (idx, record) in records.enumerate() {
        if record.len() == 1 && record[0].trim().is_empty() {
            continue;
        }
        match parse_record(&record) {
            Some(row) => rows.push(row),
            None => log::warn!("Skipping malformed metric record {}: {:?}", idx + 2, record),
        }
    }
    Ok(rows)
}

pub fn read_csv(path: impl AsRef<Path>) -> Result<Vec<MetricRow>> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)
        .map_err(|e| Error::MetricFile(format!("{}: {e}", path.display())))?;
    let rows = parse_csv(&text)?;
    log::info!("Read {} metric rows from {}", rows.len(), path.display());
    Ok(rows)
}

fn parse_record(fields: &[String]) -> Option<MetricRow> {
    let [date, category, metric, value] = fields else {
        return None;
    };
    Some(MetricRow {
        date: parse_date(date.trim())?,
        category: category.clone(),
        metric: metric.clone(),
        value: value.trim().parse().ok().filter(|v: &f64| v.is_finite())?,
    })
}

fn csv_escape(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

fn format_value(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

/// Split CSV text into records of fields, honouring quoted fields that may
/// contain commas, doubled quotes and newlines.
fn split_records(text: &str) -> Vec<Vec<String>> {
    let mut records = Vec::new();
    let mut record = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        match (c, in_quotes) {
            ('"', true) if chars.peek() == Some(&'"') => {
                chars.next();
                field.push('"');
            }
            ('"', true) => in_quotes = false,
            ('"', false) if field.is_empty() => in_quotes = true,
            (',', false) => record.push(std::mem::take(&mut field)),
            ('\r', false) => {}
            ('\n', false) => {
                record.push(std::mem::take(&mut field));
                records.push(std::mem::take(&mut record));
            }
            _ => field.push(c),
        }
    }
    if !field.is_empty() || !record.is_empty() {
        record.push(field);
        records.push(record);
    }
    records
}

/// Metric rows grouped by category, as read back for reporting.
#[derive(Debug, Clone, Default)]
pub struct MetricStore {
    by_category: BTreeMap<String, Vec<MetricRow>>,
}

impl MetricStore {
    pub fn from_rows(rows: impl IntoIterator<Item = MetricRow>) -> Self {
        let mut by_category: BTreeMap<String, Vec<MetricRow>> = BTreeMap::new();
        for row in rows {
            by_category.entry(row.category.clone()).or_default().push(row);
        }
        Self { by_category }
    }

    /// Load the metric file at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::from_rows(read_csv(path)?))
    }

    pub fn metrics_for(&self, category: &str) -> &[MetricRow] {
        self.by_category
            .get(category)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn metrics_by_category(&self) -> &BTreeMap<String, Vec<MetricRow>> {
        &self.by_category
    }

    /// `timeseries` rows whose metric starts with `prefix`, dated on or after
    /// `since` when given.
    pub fn timeseries_for(&self, prefix: &str, since: Option<NaiveDate>) -> Vec<&MetricRow> {
        self.metrics_for(category::TIMESERIES)
            .iter()
            .filter(|r| r.metric.starts_with(prefix))
            .filter(|r| since.map_or(true, |s| r.date >= s))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.by_category.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_category.is_empty()
    }
}
