//! # Throughput Binning
//!
//! Converts the timestamps that fall inside a steady-state [`Window`] into a
//! series of operation rates. Elapsed time since the first retained event is
//! cut into fixed-width buckets; each bucket's event count divided by the
//! bucket width is one rate sample.
//!
//! The bucket with the largest index is always discarded: the run rarely ends
//! on a bucket boundary, and a partial bucket would bias its rate low.
//!
//! Rates are returned in ascending bucket order. Buckets that received no
//! events are not materialized.

use crate::error::AggregationError;
use crate::trace::TraceSet;
use crate::utils::ns_to_s;
use crate::window::Window;
use std::collections::BTreeMap;
use tracing::debug;

/// Per-bucket event counts for one binning run
#[derive(Debug, Clone, PartialEq)]
pub struct BucketCounts {
    /// Surviving buckets keyed by bucket index
    pub kept: BTreeMap<u64, usize>,
    /// The highest-index bucket and its count, dropped as a partial interval
    pub discarded: Option<(u64, usize)>,
    /// Number of timestamps that fell inside the window
    pub retained: usize,
    pub bucket_width_seconds: f64,
}

impl BucketCounts {
    /// Convert surviving bucket counts to operations per second
    pub fn rates(&self) -> Vec<f64> {
        self.kept
            .values()
            .map(|&count| count as f64 / self.bucket_width_seconds)
            .collect()
    }

    /// Total events in the surviving buckets
    pub fn kept_events(&self) -> usize {
        self.kept.values().sum()
    }
}

fn validate_bucket_width(bucket_width_seconds: f64) -> Result<(), AggregationError> {
    if !bucket_width_seconds.is_finite() || bucket_width_seconds <= 0.0 {
        return Err(AggregationError::InvalidParameter {
            name: "bucket_width_seconds",
            value: bucket_width_seconds,
            reason: "must be a finite number greater than zero",
        });
    }
    Ok(())
}

/// Count windowed events per fixed-width bucket
pub fn bucket_counts(
    trace_set: &TraceSet,
    window: &Window,
    bucket_width_seconds: f64,
) -> Result<BucketCounts, AggregationError> {
    validate_bucket_width(bucket_width_seconds)?;

    let mut retained: Vec<u64> = trace_set
        .iter()
        .flat_map(|trace| trace.timestamps().iter().copied())
        .filter(|&t| window.contains(t))
        .collect();
    retained.sort_unstable();

    let earliest = match retained.first() {
        Some(&earliest) => earliest,
        None => {
            return Err(AggregationError::EmptyWindow {
                start: window.start,
                end: window.end,
            })
        }
    };

    let mut kept: BTreeMap<u64, usize> = BTreeMap::new();
    for &timestamp in &retained {
        let elapsed_s = ns_to_s(timestamp - earliest);
        let bucket = (elapsed_s / bucket_width_seconds).floor() as u64;
        *kept.entry(bucket).or_insert(0) += 1;
    }

    // Drop the maximum bucket index explicitly; it may be a partial interval.
    let discarded = kept
        .keys()
        .next_back()
        .copied()
        .and_then(|last| kept.remove(&last).map(|count| (last, count)));

    debug!(
        "Binned {} timestamps into {} buckets of {}s (discarded {:?})",
        retained.len(),
        kept.len(),
        bucket_width_seconds,
        discarded
    );

    Ok(BucketCounts {
        kept,
        discarded,
        retained: retained.len(),
        bucket_width_seconds,
    })
}

/// Throughput series (operations per second) inside `window`
///
/// An empty series is a valid result: it means every retained event fell in
/// the single, discarded bucket. No retained events at all is an
/// [`AggregationError::EmptyWindow`].
pub fn bin(
    trace_set: &TraceSet,
    window: &Window,
    bucket_width_seconds: f64,
) -> Result<Vec<f64>, AggregationError> {
    Ok(bucket_counts(trace_set, window, bucket_width_seconds)?.rates())
}
