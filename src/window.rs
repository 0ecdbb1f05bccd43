//! # Steady-State Window Alignment
//!
//! Throughput is only meaningful while every worker is running. The window
//! aligner finds the interval shared by all workers (latest first event to
//! earliest last event) and then excludes the leading `warmup_fraction` of
//! that interval's *time* to avoid ramp-up artifacts.
//!
//! This differs from latency warmup, which drops leading *events* per worker
//! (see [`crate::warmup`]).

use crate::error::{AggregationError, MalformedInput};
use crate::trace::TraceSet;
use serde::{Deserialize, Serialize};

/// Inclusive nanosecond bounds of the steady-state interval
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Window {
    pub start: u64,
    pub end: u64,
}

impl Window {
    /// Whether `timestamp` lies inside the window, both ends included
    pub fn contains(&self, timestamp: u64) -> bool {
        self.start <= timestamp && timestamp <= self.end
    }

    pub fn duration_ns(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }
}

/// Compute the steady-state window of `trace_set`
///
/// `start` is rounded up to the next whole nanosecond, so filtering integer
/// timestamps against it matches filtering against the exact real-valued
/// start `last_start + (first_end - last_start) * warmup_fraction`.
///
/// Fails with [`AggregationError::InvertedWindow`] when some worker finished
/// before another one started.
pub fn align(trace_set: &TraceSet, warmup_fraction: f64) -> Result<Window, AggregationError> {
    let mut last_start = 0u64;
    let mut first_end = u64::MAX;

    for (worker, trace) in trace_set.iter().enumerate() {
        let (first, last) = match (trace.first(), trace.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => return Err(MalformedInput::EmptyTrace { worker }.into()),
        };
        last_start = last_start.max(first);
        first_end = first_end.min(last);
    }

    if first_end < last_start {
        return Err(AggregationError::InvertedWindow {
            last_start,
            first_end,
        });
    }

    let span = first_end - last_start;
    let warmup_ns = ((span as f64) * warmup_fraction).ceil();
    // Saturating float-to-int cast, then never step past the window end.
    let warmup_ns = (warmup_ns as u64).min(span);

    Ok(Window {
        start: last_start + warmup_ns,
        end: first_end,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEC: u64 = 1_000_000_000;

    fn two_workers() -> TraceSet {
        TraceSet::from_timestamps(vec![
            vec![0, SEC, 2 * SEC],
            vec![SEC / 2, 3 * SEC / 2, 5 * SEC / 2],
        ])
        .unwrap()
    }

    #[test]
    fn test_align_without_warmup() {
        let window = align(&two_workers(), 0.0).unwrap();
        assert_eq!(
            window,
            Window {
                start: 500_000_000,
                end: 2_000_000_000
            }
        );
    }

    #[test]
    fn test_align_with_warmup_shrinks_leading_edge() {
        let window = align(&two_workers(), 0.5).unwrap();
        // span = 1.5s, half of it is warmup
        assert_eq!(window.start, 1_250_000_000);
        assert_eq!(window.end, 2_000_000_000);
    }

    #[test]
    fn test_full_warmup_collapses_to_end() {
        let window = align(&two_workers(), 1.0).unwrap();
        assert_eq!(window.start, window.end);
        assert_eq!(window.duration_ns(), 0);
    }

    #[test]
    fn test_fractional_start_rounds_up() {
        let set = TraceSet::from_timestamps(vec![vec![0, 3], vec![0, 3]]).unwrap();
        // 3 * 0.5 = 1.5 -> first admissible integer timestamp is 2
        let window = align(&set, 0.5).unwrap();
        assert_eq!(window.start, 2);
        assert!(!window.contains(1));
        assert!(window.contains(2));
        assert!(window.contains(3));
    }

    #[test]
    fn test_worker_order_does_not_matter() {
        let forward = two_workers();
        let reversed =
            TraceSet::new(forward.traces().iter().rev().cloned().collect()).unwrap();
        assert_eq!(
            align(&forward, 0.25).unwrap(),
            align(&reversed, 0.25).unwrap()
        );
    }

    #[test]
    fn test_disjoint_workers_are_an_inverted_window() {
        let set = TraceSet::from_timestamps(vec![vec![0, 10], vec![20, 30]]).unwrap();
        assert_eq!(
            align(&set, 0.0).unwrap_err(),
            AggregationError::InvertedWindow {
                last_start: 20,
                first_end: 10
            }
        );
    }

    #[test]
    fn test_single_event_workers_touching() {
        let set = TraceSet::from_timestamps(vec![vec![7], vec![7]]).unwrap();
        let window = align(&set, 0.5).unwrap();
        assert_eq!(window, Window { start: 7, end: 7 });
    }
}
