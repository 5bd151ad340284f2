use serde::Serialize;

pub const DEFAULT_PERCENTILES: [f64; 4] = [50.0, 75.0, 90.0, 95.0];

/// Round to `decimals` places.
pub fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}

pub fn round2(value: f64) -> f64 {
    round_to(value, 2)
}

/// Arithmetic mean, 0 for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// `numerator / denominator * 100`, 0 when the denominator is 0.
pub fn percent(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        0.0
    } else {
        numerator / denominator * 100.0
    }
}

/// `numerator / denominator`, 0 when the denominator is not positive.
pub fn safe_div(numerator: f64, denominator: f64) -> f64 {
    if denominator <= 0.0 {
        0.0
    } else {
        numerator / denominator
    }
}

/// Interpolated percentiles of `values`, one result per entry of
/// `percentiles` (each in `0..=100`).
///
/// For `n` sorted values the rank of percentile `p` is `p/100 * (n-1)`;
/// the result interpolates linearly between the order statistics on either
/// side of that rank and is rounded to 2 decimals. Empty input yields zeros.
pub fn calculate_percentiles(values: &[f64], percentiles: &[f64]) -> Vec<f64> {
    if values.is_empty() {
        return vec![0.0; percentiles.len()];
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let last = sorted.len() - 1;

    percentiles
        .iter()
        .map(|p| {
            let rank = (p.clamp(0.0, 100.0) / 100.0) * last as f64;
            let lower = rank.floor() as usize;
            let upper = (rank.ceil() as usize).min(last);
            let fraction = rank - rank.floor();
            round2(sorted[lower] + fraction * (sorted[upper] - sorted[lower]))
        })
        .collect()
}

/// Percentiles at [`DEFAULT_PERCENTILES`], keyed for presentation.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PercentileSummary {
    pub p50: f64,
    pub p75: f64,
    pub p90: f64,
    pub p95: f64,
}

impl PercentileSummary {
    pub fn from_values(values: &[f64]) -> Self {
        let p = calculate_percentiles(values, &DEFAULT_PERCENTILES);
        Self {
            p50: p[0],
            p75: p[1],
            p90: p[2],
            p95: p[3],
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Stats {
    pub min: f64,
    pub max: f64,
    pub avg: f64,
    pub count: usize,
}

/// Min, max, mean (rounded to `precision` decimals) and count.
pub fn build_stats(values: &[f64], precision: u32) -> Stats {
    if values.is_empty() {
        return Stats::default();
    }
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    Stats {
        min,
        max,
        avg: round_to(mean(values), precision),
        count: values.len(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistogramBucket {
    pub range: String,
    pub count: usize,
}

/// Count `values` into the buckets between consecutive `boundaries`.
///
/// Each bucket is `[low, high)`; the last one also takes everything at or
/// above the final boundary and is labelled `"<low>+"`. Values below the
/// first boundary are not counted. Fewer than two boundaries yield no
/// buckets.
pub fn build_histogram(values: &[f64], boundaries: &[f64]) -> Vec<HistogramBucket> {
    if boundaries.len() < 2 {
        return Vec::new();
    }
    let last = boundaries.len() - 2;

    boundaries
        .windows(2)
        .enumerate()
        .map(|(i, w)| {
            let (low, high) = (w[0], w[1]);
            let count = values
                .iter()
                .filter(|&&v| v >= low && (v < high || i == last))
                .count();
            let range = if i == last {
                format!("{}+", fmt_bound(low))
            } else {
                format!("{}-{}", fmt_bound(low), fmt_bound(high))
            };
            HistogramBucket { range, count }
        })
        .collect()
}

fn fmt_bound(v: f64) -> String {
    if v.fract() == 0.0 {
        format!("{}", v as i64)
    } else {
        format!("{v}")
    }
}
