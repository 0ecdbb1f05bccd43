//! # Aggregation Pipeline
//!
//! Composes the core stages behind one validated configuration:
//!
//! ```text
//! TraceSet ─► window::align ─► throughput::bin ─► rates
//!         └─► latency::samples ─────────────────► latencies ─► metrics::summarize
//! ```
//!
//! Throughput warmup removes the leading *time* of the common window, while
//! latency warmup removes leading *events* of each worker. Both use the same
//! `warmup_fraction`.
//!
//! Every stage is a pure function of its inputs, so a [`TraceAggregator`]
//! holds nothing but its configuration and can be shared across threads.

use crate::error::AggregationError;
use crate::latency::{self, SampleFormat};
use crate::metrics::{self, SummaryResult, DEFAULT_PERCENTILES};
use crate::throughput::{self, BucketCounts};
use crate::trace::TraceSet;
use crate::window::{self, Window};
use serde::{Deserialize, Serialize};
use tracing::debug;

fn default_warmup_fraction() -> f64 {
    crate::defaults::WARMUP_FRACTION
}

fn default_bucket_width_seconds() -> f64 {
    crate::defaults::BUCKET_WIDTH_SECONDS
}

fn default_percentiles() -> Vec<f64> {
    DEFAULT_PERCENTILES.to_vec()
}

/// Scalar parameters shared by every aggregation stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregationConfig {
    /// Fraction of leading events (latency) or window time (throughput) to drop
    #[serde(default = "default_warmup_fraction")]
    pub warmup_fraction: f64,

    /// Width of each throughput bucket, in seconds
    #[serde(default = "default_bucket_width_seconds")]
    pub bucket_width_seconds: f64,

    /// Percentile levels reported by summaries, in addition to p5/p50/p95
    #[serde(default = "default_percentiles")]
    pub percentiles: Vec<f64>,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            warmup_fraction: default_warmup_fraction(),
            bucket_width_seconds: default_bucket_width_seconds(),
            percentiles: default_percentiles(),
        }
    }
}

impl AggregationConfig {
    /// Check every parameter against its accepted range
    pub fn validate(&self) -> Result<(), AggregationError> {
        if !(0.0..=1.0).contains(&self.warmup_fraction) {
            return Err(AggregationError::InvalidParameter {
                name: "warmup_fraction",
                value: self.warmup_fraction,
                reason: "must be within [0, 1]",
            });
        }
        if !self.bucket_width_seconds.is_finite() || self.bucket_width_seconds <= 0.0 {
            return Err(AggregationError::InvalidParameter {
                name: "bucket_width_seconds",
                value: self.bucket_width_seconds,
                reason: "must be a finite number greater than zero",
            });
        }
        if let Some(&p) = self
            .percentiles
            .iter()
            .find(|p| !(0.0..=100.0).contains(*p))
        {
            return Err(AggregationError::InvalidParameter {
                name: "percentile",
                value: p,
                reason: "must be within [0, 100]",
            });
        }
        Ok(())
    }
}

/// Throughput series together with the window and bucket detail behind it
#[derive(Debug, Clone, PartialEq)]
pub struct ThroughputSeries {
    pub window: Window,
    pub buckets: BucketCounts,
}

impl ThroughputSeries {
    /// Rates in ops/s, ascending bucket order
    pub fn rates(&self) -> Vec<f64> {
        self.buckets.rates()
    }
}

/// Facade over the aggregation stages for one validated configuration
#[derive(Debug, Clone)]
pub struct TraceAggregator {
    config: AggregationConfig,
}

impl TraceAggregator {
    pub fn new(config: AggregationConfig) -> Result<Self, AggregationError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &AggregationConfig {
        &self.config
    }

    /// Steady-state window of `trace_set`
    pub fn window(&self, trace_set: &TraceSet) -> Result<Window, AggregationError> {
        window::align(trace_set, self.config.warmup_fraction)
    }

    /// Align, then bin: the full throughput stage
    pub fn throughput(&self, trace_set: &TraceSet) -> Result<ThroughputSeries, AggregationError> {
        let window = self.window(trace_set)?;
        let buckets =
            throughput::bucket_counts(trace_set, &window, self.config.bucket_width_seconds)?;

        debug!(
            "Throughput window [{}, {}] kept {} of {} events in {} buckets",
            window.start,
            window.end,
            buckets.kept_events(),
            trace_set.event_count(),
            buckets.kept.len()
        );
        Ok(ThroughputSeries { window, buckets })
    }

    /// Flattened, warmup-trimmed latency samples in nanoseconds
    pub fn latencies(
        &self,
        trace_set: &TraceSet,
        format: SampleFormat,
    ) -> Result<Vec<u64>, AggregationError> {
        latency::samples(trace_set, format, self.config.warmup_fraction)
    }

    /// Summary statistics with the configured percentile levels
    pub fn summarize(&self, samples: &[f64]) -> Result<SummaryResult, AggregationError> {
        metrics::summarize(samples, &self.config.percentiles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEC: u64 = 1_000_000_000;

    #[test]
    fn test_default_config() {
        let config = AggregationConfig::default();
        assert_eq!(config.warmup_fraction, 0.5);
        assert_eq!(config.bucket_width_seconds, 0.5);
        assert_eq!(config.percentiles, vec![5.0, 50.0, 95.0]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_deserializes_with_defaults() {
        let config: AggregationConfig =
            serde_json::from_str(r#"{ "warmup_fraction": 0.25 }"#).unwrap();
        assert_eq!(config.warmup_fraction, 0.25);
        assert_eq!(config.bucket_width_seconds, 0.5);
    }

    #[test]
    fn test_config_validation() {
        let bad_warmup = AggregationConfig {
            warmup_fraction: 1.5,
            ..Default::default()
        };
        assert!(TraceAggregator::new(bad_warmup).is_err());

        let bad_width = AggregationConfig {
            bucket_width_seconds: 0.0,
            ..Default::default()
        };
        assert!(TraceAggregator::new(bad_width).is_err());

        let bad_percentile = AggregationConfig {
            percentiles: vec![50.0, 120.0],
            ..Default::default()
        };
        assert!(matches!(
            bad_percentile.validate(),
            Err(AggregationError::InvalidParameter {
                name: "percentile",
                ..
            })
        ));
    }

    #[test]
    fn test_throughput_over_two_workers() {
        // Each worker completes an op every 100ms for 4 seconds.
        let a: Vec<u64> = (0..=40).map(|i| i * SEC / 10).collect();
        let b: Vec<u64> = (0..=40).map(|i| i * SEC / 10 + SEC / 20).collect();
        let set = TraceSet::from_timestamps(vec![a, b]).unwrap();

        let aggregator = TraceAggregator::new(AggregationConfig {
            warmup_fraction: 0.0,
            bucket_width_seconds: 1.0,
            ..Default::default()
        })
        .unwrap();

        let series = aggregator.throughput(&set).unwrap();
        assert_eq!(series.window.start, SEC / 20);
        assert_eq!(series.window.end, 4 * SEC);
        assert_eq!(series.rates(), vec![20.0, 20.0, 20.0]);
        assert_eq!(
            series.buckets.kept_events() + series.buckets.discarded.map_or(0, |(_, c)| c),
            series.buckets.retained
        );
    }

    #[test]
    fn test_latencies_and_summary() {
        let set = TraceSet::from_timestamps(vec![vec![0, 10, 30, 60, 100]]).unwrap();
        let aggregator = TraceAggregator::new(AggregationConfig::default()).unwrap();

        let latencies = aggregator.latencies(&set, SampleFormat::Timestamps).unwrap();
        assert_eq!(latencies, vec![30, 40]);

        let values: Vec<f64> = latencies.iter().map(|&v| v as f64).collect();
        let summary = aggregator.summarize(&values).unwrap();
        assert_eq!(summary.median, 35.0);
    }
}
