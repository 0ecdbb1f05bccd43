//! # Latency Aggregation
//!
//! Turns per-worker completion timestamps into one flat set of latency
//! samples. Each worker's consecutive timestamp differences are its
//! per-operation latencies; the leading `warmup_fraction` of those latencies
//! is dropped per worker before all workers are concatenated.
//!
//! Some experiment outputs already record one latency per operation instead
//! of completion timestamps. [`SampleFormat::Latencies`] selects that input
//! shape, in which case lines are only warmup-trimmed and concatenated.

use crate::error::{AggregationError, MalformedInput};
use crate::trace::{Trace, TraceSet};
use crate::warmup;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// What the numbers on each trace line represent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleFormat {
    /// Operation-completion timestamps; latencies are their differences
    #[default]
    #[clap(name = "timestamps")]
    Timestamps,

    /// Pre-computed per-operation latencies in nanoseconds
    #[clap(name = "latencies")]
    Latencies,
}

impl std::fmt::Display for SampleFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SampleFormat::Timestamps => write!(f, "timestamps"),
            SampleFormat::Latencies => write!(f, "latencies"),
        }
    }
}

/// Consecutive differences of one worker's timestamps
///
/// A decreasing pair is reported as [`MalformedInput::NonMonotonic`]; the
/// `index` is the position of the later timestamp.
pub fn inter_event_latencies(trace: &Trace, worker: usize) -> Result<Vec<u64>, AggregationError> {
    trace
        .timestamps()
        .windows(2)
        .enumerate()
        .map(|(i, pair)| {
            let (previous, current) = (pair[0], pair[1]);
            current.checked_sub(previous).ok_or_else(|| {
                AggregationError::from(MalformedInput::NonMonotonic {
                    worker,
                    index: i + 1,
                    previous,
                    current,
                })
            })
        })
        .collect()
}

/// Warmup-trimmed latencies of every worker, flattened in worker order
pub fn aggregate(
    trace_set: &TraceSet,
    warmup_fraction: f64,
) -> Result<Vec<u64>, AggregationError> {
    let mut samples = Vec::new();
    for (worker, trace) in trace_set.iter().enumerate() {
        let latencies = inter_event_latencies(trace, worker)?;
        samples.extend_from_slice(warmup::trim(&latencies, warmup_fraction));
    }
    Ok(samples)
}

/// Warmup-trim lines that already hold latencies and flatten them
pub fn flatten_recorded(trace_set: &TraceSet, warmup_fraction: f64) -> Vec<u64> {
    trace_set
        .iter()
        .flat_map(|trace| warmup::trim(trace.timestamps(), warmup_fraction).iter().copied())
        .collect()
}

/// Latency samples for `trace_set` interpreted according to `format`
pub fn samples(
    trace_set: &TraceSet,
    format: SampleFormat,
    warmup_fraction: f64,
) -> Result<Vec<u64>, AggregationError> {
    match format {
        SampleFormat::Timestamps => aggregate(trace_set, warmup_fraction),
        SampleFormat::Latencies => Ok(flatten_recorded(trace_set, warmup_fraction)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_worker_without_warmup() {
        let set = TraceSet::from_timestamps(vec![vec![0, 100, 250]]).unwrap();
        assert_eq!(aggregate(&set, 0.0).unwrap(), vec![100, 150]);
    }

    #[test]
    fn test_warmup_applies_to_latencies_per_worker() {
        let set = TraceSet::from_timestamps(vec![
            // latencies 10, 20, 30, 40 -> drop first 2
            vec![0, 10, 30, 60, 100],
            // latencies 5, 5 -> drop first 1
            vec![1000, 1005, 1010],
        ])
        .unwrap();
        assert_eq!(aggregate(&set, 0.5).unwrap(), vec![30, 40, 5]);
    }

    #[test]
    fn test_decreasing_timestamps_are_malformed() {
        let set = TraceSet::from_timestamps(vec![vec![0, 1], vec![100, 50]]).unwrap();
        assert_eq!(
            aggregate(&set, 0.0).unwrap_err(),
            AggregationError::MalformedInput(MalformedInput::NonMonotonic {
                worker: 1,
                index: 1,
                previous: 100,
                current: 50,
            })
        );
    }

    #[test]
    fn test_violation_inside_warmup_is_still_fatal() {
        let set = TraceSet::from_timestamps(vec![vec![10, 5, 20, 30]]).unwrap();
        assert!(aggregate(&set, 0.9).is_err());
    }

    #[test]
    fn test_single_event_worker_yields_no_latencies() {
        let set = TraceSet::from_timestamps(vec![vec![42], vec![0, 7]]).unwrap();
        assert_eq!(aggregate(&set, 0.0).unwrap(), vec![7]);
    }

    #[test]
    fn test_equal_timestamps_are_zero_latency() {
        let set = TraceSet::from_timestamps(vec![vec![5, 5, 9]]).unwrap();
        assert_eq!(aggregate(&set, 0.0).unwrap(), vec![0, 4]);
    }

    #[test]
    fn test_flatten_recorded_trims_each_line() {
        let set = TraceSet::from_timestamps(vec![vec![9, 8, 7, 6], vec![1, 2]]).unwrap();
        assert_eq!(flatten_recorded(&set, 0.5), vec![7, 6, 2]);
        assert_eq!(
            samples(&set, SampleFormat::Latencies, 0.0).unwrap(),
            vec![9, 8, 7, 6, 1, 2]
        );
    }
}
