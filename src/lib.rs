//! # Trace Aggregator Library
//!
//! Derives steady-state throughput and latency statistics from per-worker
//! operation traces recorded during distributed and single-node experiments.
//!
//! ## Aggregation Pipeline
//!
//! Each worker records the nanosecond timestamp at which every operation
//! completed. From a set of such traces the library computes:
//!
//! - **Throughput**: the interval during which every worker was active is
//!   found, its leading warmup time is dropped, and the remaining events are
//!   counted in fixed-width time buckets to give an ops/s series
//! - **Latency**: consecutive timestamp differences per worker, with the
//!   leading warmup events of each worker dropped, flattened into one sample set
//! - **Summaries**: percentiles (linear interpolation), median, mean and
//!   standard deviation over any flattened sample set
//!
//! ## Architecture Overview
//!
//! - `trace`: trace model and the comma-separated trace file reader
//! - `warmup`, `window`, `throughput`, `latency`: the aggregation stages
//! - `metrics`: summary statistics
//! - `pipeline`: validated configuration and the `TraceAggregator` facade
//! - `processors`: configuration-driven jobs and their dispatch table
//! - `results`: results files and JSON summary reports
//! - `fairness`: two-principal fairness traces
//! - `cli`, `logging`, `utils`: command line, log setup and helpers
//!
//! ## Usage Example
//!
//! ```rust
//! use trace_aggregator::{AggregationConfig, TraceAggregator, TraceSet};
//! use trace_aggregator::latency::SampleFormat;
//!
//! # fn main() -> anyhow::Result<()> {
//! const SEC: u64 = 1_000_000_000;
//! let traces = TraceSet::from_timestamps(vec![
//!     (0..=20).map(|i| i * SEC / 4).collect(),
//!     (0..=20).map(|i| i * SEC / 4 + SEC / 8).collect(),
//! ])?;
//!
//! let aggregator = TraceAggregator::new(AggregationConfig {
//!     warmup_fraction: 0.0,
//!     ..Default::default()
//! })?;
//!
//! let rates = aggregator.throughput(&traces)?.rates();
//! assert!(rates.iter().all(|&r| r == 8.0));
//!
//! let latencies = aggregator.latencies(&traces, SampleFormat::Timestamps)?;
//! assert!(latencies.iter().all(|&l| l == SEC / 4));
//! # Ok(())
//! # }
//! ```

/// Typed errors of the aggregation core
pub mod error;

/// Trace model and trace file parsing
pub mod trace;

/// Warmup trimming by event count
pub mod warmup;

/// Steady-state window alignment across workers
pub mod window;

/// Fixed-width throughput bucketing
pub mod throughput;

/// Per-worker latency derivation and flattening
pub mod latency;

/// Percentile, median, mean and standard deviation summaries
pub mod metrics;

/// Configuration and the facade composing the aggregation stages
pub mod pipeline;

/// Two-principal fairness traces
pub mod fairness;

/// Job configuration, processor dispatch table and parallel job runner
pub mod processors;

/// Results files and JSON summary reports
pub mod results;

/// Command-line interface
pub mod cli;

/// Log subscriber setup
pub mod logging;

pub mod utils;

pub use error::{AggregationError, MalformedInput};
pub use metrics::{summarize, SummaryResult};
pub use pipeline::{AggregationConfig, TraceAggregator};
pub use processors::{JobRunner, JobsConfig, ProcessorRegistry};
pub use trace::{Trace, TraceSet};
pub use window::Window;

/// The current version of the trace aggregator
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default configuration values
pub mod defaults {
    /// Fraction of warmup discarded from each trace or window
    ///
    /// JIT compilation, cache warming and connection setup make early
    /// operations unrepresentative; half of each run is dropped by default.
    pub const WARMUP_FRACTION: f64 = 0.5;

    /// Throughput bucket width, in seconds
    pub const BUCKET_WIDTH_SECONDS: f64 = 0.5;
}
