//! # Trace Input Model
//!
//! A [`Trace`] is the ordered list of operation-completion timestamps (in
//! nanoseconds) recorded by one worker. A [`TraceSet`] groups the traces of
//! every worker in one experiment run and is the raw input of every
//! aggregation stage.
//!
//! ## File Format
//!
//! Trace files hold one worker per line, each line a comma-separated list of
//! integer nanosecond timestamps:
//!
//! ```text
//! 1000,2000,3500,
//! 1200,2400,3100
//! ```
//!
//! Whitespace around fields and empty fields (such as a trailing comma) are
//! ignored. Lines that are blank are skipped rather than treated as workers.

use crate::error::{AggregationError, MalformedInput};
use anyhow::{Context, Result};
use std::path::Path;
use tracing::debug;

/// Operation-completion timestamps of a single worker, in nanoseconds
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Trace {
    timestamps: Vec<u64>,
}

impl Trace {
    pub fn new(timestamps: Vec<u64>) -> Self {
        Self { timestamps }
    }

    pub fn timestamps(&self) -> &[u64] {
        &self.timestamps
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    /// Time of the worker's first recorded operation
    pub fn first(&self) -> Option<u64> {
        self.timestamps.first().copied()
    }

    /// Time of the worker's last recorded operation
    pub fn last(&self) -> Option<u64> {
        self.timestamps.last().copied()
    }
}

impl From<Vec<u64>> for Trace {
    fn from(timestamps: Vec<u64>) -> Self {
        Self::new(timestamps)
    }
}

/// The traces of every worker in one run
///
/// Construction guarantees at least one worker and that no worker trace is
/// empty, so window alignment is always defined on a `TraceSet`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceSet {
    traces: Vec<Trace>,
}

impl TraceSet {
    /// Build a trace set, rejecting inputs that leave windowing undefined
    pub fn new(traces: Vec<Trace>) -> Result<Self, AggregationError> {
        if traces.is_empty() {
            return Err(MalformedInput::NoWorkers.into());
        }
        if let Some(worker) = traces.iter().position(Trace::is_empty) {
            return Err(MalformedInput::EmptyTrace { worker }.into());
        }
        Ok(Self { traces })
    }

    /// Convenience constructor from raw per-worker timestamp vectors
    pub fn from_timestamps(per_worker: Vec<Vec<u64>>) -> Result<Self, AggregationError> {
        Self::new(per_worker.into_iter().map(Trace::new).collect())
    }

    pub fn traces(&self) -> &[Trace] {
        &self.traces
    }

    pub fn worker_count(&self) -> usize {
        self.traces.len()
    }

    /// Total number of events across all workers
    pub fn event_count(&self) -> usize {
        self.traces.iter().map(Trace::len).sum()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Trace> {
        self.traces.iter()
    }
}

impl<'a> IntoIterator for &'a TraceSet {
    type Item = &'a Trace;
    type IntoIter = std::slice::Iter<'a, Trace>;

    fn into_iter(self) -> Self::IntoIter {
        self.traces.iter()
    }
}

/// Parse one comma-separated line of timestamps belonging to `worker`
pub fn parse_trace_line(line: &str, worker: usize) -> Result<Trace, AggregationError> {
    let mut timestamps = Vec::new();
    for token in line.split(',') {
        let token = token.trim();
        if token.is_empty() {
            continue;
        }
        let value = token
            .parse::<u64>()
            .map_err(|_| MalformedInput::InvalidTimestamp {
                worker,
                token: token.to_string(),
            })?;
        timestamps.push(value);
    }
    Ok(Trace::new(timestamps))
}

/// Parse a whole trace document, one worker per non-blank line
pub fn parse_trace_set(text: &str) -> Result<TraceSet, AggregationError> {
    let traces = text
        .lines()
        .filter(|line| !line.trim().is_empty())
        .enumerate()
        .map(|(worker, line)| parse_trace_line(line, worker))
        .collect::<Result<Vec<_>, _>>()?;
    TraceSet::new(traces)
}

/// Read and parse a trace file from disk
pub fn read_trace_file(path: &Path) -> Result<TraceSet> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read trace file {}", path.display()))?;
    let trace_set = parse_trace_set(&text)
        .with_context(|| format!("Failed to parse trace file {}", path.display()))?;

    debug!(
        "Loaded {} workers ({} events) from {}",
        trace_set.worker_count(),
        trace_set.event_count(),
        path.display()
    );
    Ok(trace_set)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_trace_line_skips_blank_fields() {
        let trace = parse_trace_line(" 10, 20 ,,30,\n", 0).unwrap();
        assert_eq!(trace.timestamps(), &[10, 20, 30]);
        assert_eq!(trace.first(), Some(10));
        assert_eq!(trace.last(), Some(30));
    }

    #[test]
    fn test_parse_trace_line_rejects_non_integer() {
        let err = parse_trace_line("10,abc,30", 4).unwrap_err();
        assert_eq!(
            err,
            AggregationError::MalformedInput(MalformedInput::InvalidTimestamp {
                worker: 4,
                token: "abc".to_string(),
            })
        );
    }

    #[test]
    fn test_parse_trace_line_rejects_negative_values() {
        assert!(parse_trace_line("10,-5", 0).is_err());
    }

    #[test]
    fn test_parse_trace_set_skips_blank_lines() {
        let set = parse_trace_set("1,2,3\n\n4,5\n   \n").unwrap();
        assert_eq!(set.worker_count(), 2);
        assert_eq!(set.event_count(), 5);
        assert_eq!(set.traces()[1].timestamps(), &[4, 5]);
    }

    #[test]
    fn test_empty_trace_set_is_malformed() {
        assert_eq!(
            TraceSet::new(Vec::new()).unwrap_err(),
            AggregationError::MalformedInput(MalformedInput::NoWorkers)
        );
        assert_eq!(
            parse_trace_set("\n\n").unwrap_err(),
            AggregationError::MalformedInput(MalformedInput::NoWorkers)
        );
    }

    #[test]
    fn test_empty_worker_trace_is_malformed() {
        let err = TraceSet::from_timestamps(vec![vec![1, 2], vec![]]).unwrap_err();
        assert_eq!(
            err,
            AggregationError::MalformedInput(MalformedInput::EmptyTrace { worker: 1 })
        );

        // A line made only of separators is a worker with no events.
        assert!(parse_trace_set("1,2\n,,\n").is_err());
    }

    #[test]
    fn test_read_trace_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "0,1000000000,2000000000").unwrap();
        writeln!(file, "500000000,1500000000,2500000000").unwrap();

        let set = read_trace_file(file.path()).unwrap();
        assert_eq!(set.worker_count(), 2);
        assert_eq!(set.traces()[0].last(), Some(2_000_000_000));
    }

    #[test]
    fn test_read_missing_trace_file_names_path() {
        let err = read_trace_file(Path::new("/nonexistent/trace.csv")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/trace.csv"));
    }
}
