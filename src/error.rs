//! # Aggregation Error Taxonomy
//!
//! Every precondition the aggregation core checks maps to exactly one variant
//! of [`AggregationError`]. None of them are recoverable inside the core: the
//! trace data is static, so retrying cannot change the outcome. Callers get a
//! typed value that names the failed invariant and, where it applies, the
//! offending worker.
//!
//! The I/O and orchestration layers wrap these in `anyhow::Error` with
//! context; the typed value stays reachable through `downcast_ref`.

use thiserror::Error;

/// Ways an input trace (or a derived sequence) can violate its invariants
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedInput {
    /// The trace set contains no workers at all
    #[error("trace set contains no workers")]
    NoWorkers,

    /// A worker trace has zero events, which leaves its window bounds undefined
    #[error("worker {worker} has an empty trace")]
    EmptyTrace { worker: usize },

    /// Two consecutive timestamps decrease, which would yield a negative latency
    #[error(
        "worker {worker} has out-of-order timestamps at position {index}: {previous} followed by {current}"
    )]
    NonMonotonic {
        worker: usize,
        index: usize,
        previous: u64,
        current: u64,
    },

    /// A field on a trace line is not an unsigned integer nanosecond timestamp
    #[error("worker {worker} has an invalid timestamp token {token:?}")]
    InvalidTimestamp { worker: usize, token: String },

    /// A fairness entry is not of the form `<0|1>|<timestamp>`
    #[error("fairness entry {index} is malformed: {entry:?}")]
    InvalidFairnessEntry { index: usize, entry: String },
}

/// Errors produced by the trace aggregation core
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AggregationError {
    /// Details are carried as the error source
    #[error("malformed input")]
    MalformedInput(#[from] MalformedInput),

    /// The steady-state window retained no timestamps from any worker
    #[error("steady-state window [{start}, {end}] contains no timestamps")]
    EmptyWindow { start: u64, end: u64 },

    /// Statistics were requested over zero samples
    #[error("cannot summarize an empty sample set")]
    EmptyInput,

    /// No interval exists during which every worker was active
    #[error(
        "no common activity window: latest worker start {last_start} is after earliest worker end {first_end}"
    )]
    InvertedWindow { last_start: u64, first_end: u64 },

    /// A scalar parameter is outside its accepted range
    #[error("invalid {name} {value}: {reason}")]
    InvalidParameter {
        name: &'static str,
        value: f64,
        reason: &'static str,
    },
}

impl AggregationError {
    /// Worker index the error refers to, when it refers to a single worker
    pub fn worker(&self) -> Option<usize> {
        match self {
            AggregationError::MalformedInput(MalformedInput::EmptyTrace { worker })
            | AggregationError::MalformedInput(MalformedInput::NonMonotonic { worker, .. })
            | AggregationError::MalformedInput(MalformedInput::InvalidTimestamp {
                worker, ..
            }) => Some(*worker),
            _ => None,
        }
    }
}
