use crate::error::AggregationError;
use serde::{Deserialize, Serialize};

/// Percentiles always present in a [`SummaryResult`]
pub const DEFAULT_PERCENTILES: [f64; 3] = [5.0, 50.0, 95.0];

/// Percentile value pair
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PercentileValue {
    pub percentile: f64,
    pub value: f64,
}

/// Summary statistics over one flattened sample set
///
/// Every field is computed from the sorted samples, so two orderings of the
/// same multiset produce bit-identical results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryResult {
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub median: f64,
    pub std_dev: f64,
    pub p5: f64,
    pub p95: f64,
    pub percentiles: Vec<PercentileValue>,
}

impl SummaryResult {
    /// Look up a requested percentile by level
    pub fn percentile(&self, level: f64) -> Option<f64> {
        self.percentiles
            .iter()
            .find(|p| (p.percentile - level).abs() < 1e-9)
            .map(|p| p.value)
    }

    /// Multiply every value-valued statistic by `factor` (unit conversion)
    pub fn scaled(&self, factor: f64) -> Self {
        Self {
            count: self.count,
            min: self.min * factor,
            max: self.max * factor,
            mean: self.mean * factor,
            median: self.median * factor,
            std_dev: self.std_dev * factor,
            p5: self.p5 * factor,
            p95: self.p95 * factor,
            percentiles: self
                .percentiles
                .iter()
                .map(|p| PercentileValue {
                    percentile: p.percentile,
                    value: p.value * factor,
                })
                .collect(),
        }
    }
}

fn validate_percentile(p: f64) -> Result<(), AggregationError> {
    if !(0.0..=100.0).contains(&p) {
        return Err(AggregationError::InvalidParameter {
            name: "percentile",
            value: p,
            reason: "must be within [0, 100]",
        });
    }
    Ok(())
}

fn sorted_copy(samples: &[f64]) -> Result<Vec<f64>, AggregationError> {
    if samples.is_empty() {
        return Err(AggregationError::EmptyInput);
    }
    let mut sorted = samples.to_vec();
    sorted.sort_by(f64::total_cmp);
    Ok(sorted)
}

/// Linearly interpolated percentile of already sorted, non-empty samples
fn percentile_of_sorted(sorted: &[f64], p: f64) -> f64 {
    let rank = (p / 100.0) * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = (rank.ceil() as usize).min(sorted.len() - 1);

    if lower == upper {
        sorted[lower]
    } else {
        let weight = rank - lower as f64;
        sorted[lower] + weight * (sorted[upper] - sorted[lower])
    }
}

fn mean_of_sorted(sorted: &[f64]) -> f64 {
    sorted.iter().sum::<f64>() / sorted.len() as f64
}

/// Population standard deviation
fn std_dev_of_sorted(sorted: &[f64], mean: f64) -> f64 {
    let variance =
        sorted.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / sorted.len() as f64;
    variance.sqrt()
}

/// Percentile `p` (0-100) of `samples` using linear interpolation between ranks
pub fn percentile(samples: &[f64], p: f64) -> Result<f64, AggregationError> {
    validate_percentile(p)?;
    let sorted = sorted_copy(samples)?;
    Ok(percentile_of_sorted(&sorted, p))
}

pub fn median(samples: &[f64]) -> Result<f64, AggregationError> {
    percentile(samples, 50.0)
}

pub fn mean(samples: &[f64]) -> Result<f64, AggregationError> {
    let sorted = sorted_copy(samples)?;
    Ok(mean_of_sorted(&sorted))
}

pub fn std_dev(samples: &[f64]) -> Result<f64, AggregationError> {
    let sorted = sorted_copy(samples)?;
    Ok(std_dev_of_sorted(&sorted, mean_of_sorted(&sorted)))
}

/// Summarize `samples`, adding each level in `percentiles` to the result
///
/// p5, median and p95 are always reported; `percentiles` lists extra levels
/// (duplicates of the defaults are fine).
pub fn summarize(samples: &[f64], percentiles: &[f64]) -> Result<SummaryResult, AggregationError> {
    for &p in percentiles {
        validate_percentile(p)?;
    }
    let sorted = sorted_copy(samples)?;

    let mean = mean_of_sorted(&sorted);
    let percentile_values = percentiles
        .iter()
        .map(|&p| PercentileValue {
            percentile: p,
            value: percentile_of_sorted(&sorted, p),
        })
        .collect();

    Ok(SummaryResult {
        count: sorted.len(),
        min: sorted[0],
        max: sorted[sorted.len() - 1],
        mean,
        median: percentile_of_sorted(&sorted, 50.0),
        std_dev: std_dev_of_sorted(&sorted, mean),
        p5: percentile_of_sorted(&sorted, 5.0),
        p95: percentile_of_sorted(&sorted, 95.0),
        percentiles: percentile_values,
    })
}

/// Summarize integer nanosecond samples such as latencies
pub fn summarize_ns(samples: &[u64], percentiles: &[f64]) -> Result<SummaryResult, AggregationError> {
    let values: Vec<f64> = samples.iter().map(|&v| v as f64).collect();
    summarize(&values, percentiles)
}
