//! # Job Processors
//!
//! A job configuration file lists post-processing jobs, each naming a
//! processor and the trace files it consumes. The mapping from processor
//! names to routines lives in a [`ProcessorRegistry`] that the caller builds
//! and hands to the [`JobRunner`]; nothing is registered globally.
//!
//! ## Configuration Format
//!
//! ```json
//! {
//!   "warmup_fraction": 0.5,
//!   "bucket_width_seconds": 0.5,
//!   "continue_on_error": false,
//!   "jobs": [
//!     {
//!       "processor": "single.throughput",
//!       "output_filename": "throughput.csv",
//!       "input_tuple_list": [
//!         { "num_switches": 1, "filename": "1_switch.csv" },
//!         { "num_switches": 2, "filename": "2_switch.csv" }
//!       ]
//!     },
//!     {
//!       "processor": "single.read_only",
//!       "output_filename": "read_only.csv",
//!       "latency_filename": "read_only_trace.csv"
//!     }
//!   ]
//! }
//! ```
//!
//! Every processor writes exactly one output file, one line per input, with
//! a leading label field (switch count, artificial delay or algorithm flag)
//! followed by the derived values.
//!
//! Latency inputs hold one recorded latency per operation unless the input
//! sets `"format": "timestamps"` (or the job sets `"latency_format"`), in
//! which case latencies are the differences of completion timestamps.

use crate::fairness::{fairness_label, read_fairness_file};
use crate::latency::SampleFormat;
use crate::pipeline::{AggregationConfig, TraceAggregator};
use crate::results::{write_results_file, ResultRow};
use crate::trace::read_trace_file;
use crate::utils::us_to_ns;
use anyhow::{anyhow, bail, Context, Result};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Component, Path, PathBuf};
use std::time::Instant;
use tracing::{debug, error, info};

/// One input file of a job plus the label fields that describe it
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InputSpec {
    pub filename: PathBuf,

    #[serde(default)]
    pub num_switches: Option<u64>,

    /// Artificial controller delay, in microseconds
    #[serde(default)]
    pub delay_us: Option<u64>,

    /// Whether the fairness run used wound-wait scheduling
    #[serde(default)]
    pub wound_wait_on: Option<bool>,

    /// How to interpret the numbers in `filename`; recorded latencies if unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<SampleFormat>,
}

/// A single post-processing job
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobSpec {
    pub processor: String,
    pub output_filename: PathBuf,

    #[serde(default)]
    pub input_tuple_list: Vec<InputSpec>,

    #[serde(default)]
    pub latency_filename: Option<PathBuf>,

    /// Format of `latency_filename`; recorded latencies if unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latency_format: Option<SampleFormat>,
}

impl JobSpec {
    fn inputs(&self) -> Result<&[InputSpec]> {
        if self.input_tuple_list.is_empty() {
            bail!(
                "Processor {} requires a non-empty input_tuple_list",
                self.processor
            );
        }
        Ok(&self.input_tuple_list)
    }

    fn latency_file(&self) -> Result<&Path> {
        self.latency_filename
            .as_deref()
            .ok_or_else(|| anyhow!("Processor {} requires latency_filename", self.processor))
    }
}

/// Top-level job configuration file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobsConfig {
    #[serde(flatten)]
    pub aggregation: AggregationConfig,

    #[serde(default)]
    pub continue_on_error: bool,

    pub jobs: Vec<JobSpec>,
}

impl JobsConfig {
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).context("Invalid job configuration")
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration {}", path.display()))?;
        Self::from_json(&text).with_context(|| format!("In configuration {}", path.display()))
    }
}

/// Routine that turns one job into the rows of its output file
pub type ProcessorFn = fn(&JobSpec, &TraceAggregator) -> Result<Vec<ResultRow>>;

/// Name → routine dispatch table
#[derive(Clone, Default)]
pub struct ProcessorRegistry {
    processors: HashMap<String, ProcessorFn>,
}

impl std::fmt::Debug for ProcessorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessorRegistry")
            .field("processors", &self.names())
            .finish()
    }
}

impl ProcessorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every built-in processor
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register("single.throughput", throughput_processor);
        registry.register("dist.throughput", throughput_processor);
        registry.register("single.latency_contention", latency_contention_processor);
        registry.register("single.latency_rtt", latency_rtt_processor);
        registry.register("single.read_only", read_only_processor);
        registry.register("dist.latency", read_only_processor);
        registry.register("single.fairness", fairness_processor);
        registry
    }

    /// Add or replace the routine for `name`
    pub fn register(&mut self, name: impl Into<String>, processor: ProcessorFn) {
        self.processors.insert(name.into(), processor);
    }

    pub fn get(&self, name: &str) -> Option<ProcessorFn> {
        self.processors.get(name).copied()
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.processors.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

fn required_switches(input: &InputSpec) -> Result<u64> {
    input
        .num_switches
        .ok_or_else(|| anyhow!("Input {} is missing num_switches", input.filename.display()))
}

fn throughput_processor(job: &JobSpec, aggregator: &TraceAggregator) -> Result<Vec<ResultRow>> {
    job.inputs()?
        .iter()
        .map(|input| {
            let num_switches = required_switches(input)?;
            let trace_set = read_trace_file(&input.filename)?;
            let series = aggregator
                .throughput(&trace_set)
                .with_context(|| format!("Throughput of {}", input.filename.display()))?;
            Ok(ResultRow::numeric(num_switches, &series.rates()))
        })
        .collect()
}

/// Format assumed for latency inputs that do not name one
pub const DEFAULT_LATENCY_FORMAT: SampleFormat = SampleFormat::Latencies;

fn latency_row(
    aggregator: &TraceAggregator,
    label: u64,
    path: &Path,
    format: Option<SampleFormat>,
) -> Result<ResultRow> {
    let format = format.unwrap_or(DEFAULT_LATENCY_FORMAT);
    let trace_set = read_trace_file(path)?;
    let latencies = aggregator
        .latencies(&trace_set, format)
        .with_context(|| format!("Latencies of {}", path.display()))?;
    Ok(ResultRow::numeric(label, &latencies))
}

fn latency_contention_processor(
    job: &JobSpec,
    aggregator: &TraceAggregator,
) -> Result<Vec<ResultRow>> {
    job.inputs()?
        .iter()
        .map(|input| {
            let num_switches = required_switches(input)?;
            latency_row(aggregator, num_switches, &input.filename, input.format)
        })
        .collect()
}

fn latency_rtt_processor(job: &JobSpec, aggregator: &TraceAggregator) -> Result<Vec<ResultRow>> {
    job.inputs()?
        .iter()
        .map(|input| {
            let delay_us = input
                .delay_us
                .ok_or_else(|| anyhow!("Input {} is missing delay_us", input.filename.display()))?;
            latency_row(aggregator, us_to_ns(delay_us), &input.filename, input.format)
        })
        .collect()
}

/// Single-switch latency: the label is always 1
fn read_only_processor(job: &JobSpec, aggregator: &TraceAggregator) -> Result<Vec<ResultRow>> {
    let row = latency_row(aggregator, 1, job.latency_file()?, job.latency_format)?;
    Ok(vec![row])
}

/// Label 0 marks wound-wait scheduling, 1 the alternative algorithm
fn fairness_processor(job: &JobSpec, _aggregator: &TraceAggregator) -> Result<Vec<ResultRow>> {
    job.inputs()?
        .iter()
        .map(|input| {
            let wound_wait_on = input.wound_wait_on.ok_or_else(|| {
                anyhow!("Input {} is missing wound_wait_on", input.filename.display())
            })?;
            let sequence = read_fairness_file(&input.filename)?;
            Ok(ResultRow::new(
                fairness_label(wound_wait_on).to_string(),
                sequence.to_fields(),
            ))
        })
        .collect()
}

/// Absolute, lexically normalized form of an output path
///
/// `a.csv`, `./a.csv` and `out/../a.csv` all name the same file.
fn normalized_output(path: &Path) -> PathBuf {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|dir| dir.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };

    let mut normalized = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

/// Result of running one job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobOutcome {
    pub processor: String,
    pub output_filename: PathBuf,
    pub rows: usize,
}

/// Runs jobs against a registry, in parallel by default
pub struct JobRunner<'a> {
    registry: &'a ProcessorRegistry,
    aggregator: TraceAggregator,
    parallel: bool,
}

impl<'a> JobRunner<'a> {
    pub fn new(registry: &'a ProcessorRegistry, config: AggregationConfig) -> Result<Self> {
        let aggregator = TraceAggregator::new(config)?;
        Ok(Self {
            registry,
            aggregator,
            parallel: true,
        })
    }

    /// Run jobs one after another instead of on the rayon pool
    pub fn sequential(mut self) -> Self {
        self.parallel = false;
        self
    }

    /// Reject unknown processors and shared output files before running anything
    pub fn check(&self, jobs: &[JobSpec]) -> Result<()> {
        let mut outputs = HashSet::new();
        for (index, job) in jobs.iter().enumerate() {
            if self.registry.get(&job.processor).is_none() {
                bail!(
                    "Job {} uses unknown processor {:?} (available: {})",
                    index,
                    job.processor,
                    self.registry.names().join(", ")
                );
            }
            if !outputs.insert(normalized_output(&job.output_filename)) {
                bail!(
                    "Job {} writes {} which another job already writes",
                    index,
                    job.output_filename.display()
                );
            }
        }
        Ok(())
    }

    /// Run one job and write its output file
    pub fn run_job(&self, job: &JobSpec) -> Result<JobOutcome> {
        let processor = self
            .registry
            .get(&job.processor)
            .ok_or_else(|| anyhow!("Unknown processor {:?}", job.processor))?;

        let started = Instant::now();
        let rows = processor(job, &self.aggregator)
            .with_context(|| format!("Processor {} failed", job.processor))?;
        write_results_file(&job.output_filename, &rows)?;

        debug!(
            "Job {} finished in {:.3}s",
            job.processor,
            started.elapsed().as_secs_f64()
        );
        Ok(JobOutcome {
            processor: job.processor.clone(),
            output_filename: job.output_filename.clone(),
            rows: rows.len(),
        })
    }

    /// Run every job; each job owns its output file, so jobs never contend
    ///
    /// Without `continue_on_error` the first failure (in job order) is
    /// returned. With it, failures are logged and only successes returned.
    pub fn run_all(&self, jobs: &[JobSpec], continue_on_error: bool) -> Result<Vec<JobOutcome>> {
        self.check(jobs)?;
        info!("Running {} jobs", jobs.len());

        let results: Vec<Result<JobOutcome>> = if self.parallel {
            jobs.par_iter().map(|job| self.run_job(job)).collect()
        } else {
            jobs.iter().map(|job| self.run_job(job)).collect()
        };

        let mut outcomes = Vec::with_capacity(results.len());
        for (job, result) in jobs.iter().zip(results) {
            match result {
                Ok(outcome) => {
                    info!(
                        "Job {} completed: {} rows -> {:?}",
                        outcome.processor, outcome.rows, outcome.output_filename
                    );
                    outcomes.push(outcome);
                }
                Err(e) => {
                    error!("Job {} failed: {:#}", job.processor, e);
                    if !continue_on_error {
                        return Err(e);
                    }
                }
            }
        }
        Ok(outcomes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn runner_config() -> AggregationConfig {
        AggregationConfig {
            warmup_fraction: 0.0,
            ..Default::default()
        }
    }

    #[test]
    fn test_builtin_registry_names() {
        let registry = ProcessorRegistry::with_builtin();
        assert_eq!(
            registry.names(),
            vec![
                "dist.latency",
                "dist.throughput",
                "single.fairness",
                "single.latency_contention",
                "single.latency_rtt",
                "single.read_only",
                "single.throughput",
            ]
        );
        assert!(registry.get("single.nope").is_none());
    }

    #[test]
    fn test_custom_processor_registration() {
        fn constant(_: &JobSpec, _: &TraceAggregator) -> Result<Vec<ResultRow>> {
            Ok(vec![ResultRow::numeric(7, &[1u64])])
        }

        let mut registry = ProcessorRegistry::new();
        registry.register("custom.constant", constant);
        let processor = registry.get("custom.constant").unwrap();

        let aggregator = TraceAggregator::new(runner_config()).unwrap();
        let rows = processor(&JobSpec::default(), &aggregator).unwrap();
        assert_eq!(rows[0].to_line(), "7,1");
    }

    #[test]
    fn test_check_rejects_unknown_processor_and_shared_outputs() {
        let registry = ProcessorRegistry::with_builtin();
        let runner = JobRunner::new(&registry, runner_config()).unwrap();

        let unknown = vec![JobSpec {
            processor: "single.bogus".to_string(),
            output_filename: PathBuf::from("a.csv"),
            ..Default::default()
        }];
        let err = runner.check(&unknown).unwrap_err();
        assert!(err.to_string().contains("single.bogus"));

        let shared = vec![
            JobSpec {
                processor: "single.throughput".to_string(),
                output_filename: PathBuf::from("same.csv"),
                ..Default::default()
            },
            JobSpec {
                processor: "single.read_only".to_string(),
                output_filename: PathBuf::from("same.csv"),
                ..Default::default()
            },
        ];
        assert!(runner.check(&shared).is_err());

        for (first, second) in [
            ("a.csv", "./a.csv"),
            ("out/a.csv", "out/./a.csv"),
            ("a.csv", "out/../a.csv"),
        ] {
            let aliased = vec![
                JobSpec {
                    processor: "single.throughput".to_string(),
                    output_filename: PathBuf::from(first),
                    ..Default::default()
                },
                JobSpec {
                    processor: "single.read_only".to_string(),
                    output_filename: PathBuf::from(second),
                    ..Default::default()
                },
            ];
            let err = runner.check(&aliased).unwrap_err();
            assert!(err.to_string().contains("another job already writes"));
        }

        let distinct = vec![
            JobSpec {
                processor: "single.throughput".to_string(),
                output_filename: PathBuf::from("a.csv"),
                ..Default::default()
            },
            JobSpec {
                processor: "single.read_only".to_string(),
                output_filename: PathBuf::from("out/a.csv"),
                ..Default::default()
            },
        ];
        assert!(runner.check(&distinct).is_ok());
    }

    #[test]
    fn test_latency_processors_default_to_recorded_latencies() {
        let dir = tempfile::TempDir::new().unwrap();
        let recorded = dir.path().join("recorded.csv");
        std::fs::write(&recorded, "5,3,8,2\n").unwrap();
        let aggregator = TraceAggregator::new(runner_config()).unwrap();

        let job = JobSpec {
            processor: "single.read_only".to_string(),
            latency_filename: Some(recorded.clone()),
            ..Default::default()
        };
        let rows = read_only_processor(&job, &aggregator).unwrap();
        assert_eq!(rows[0].to_line(), "1,5,3,8,2");

        let contention = JobSpec {
            processor: "single.latency_contention".to_string(),
            input_tuple_list: vec![InputSpec {
                filename: recorded.clone(),
                num_switches: Some(4),
                ..Default::default()
            }],
            ..Default::default()
        };
        let rows = latency_contention_processor(&contention, &aggregator).unwrap();
        assert_eq!(rows[0].to_line(), "4,5,3,8,2");

        // Timestamps must be asked for explicitly, and are then differenced.
        let as_timestamps = JobSpec {
            latency_format: Some(SampleFormat::Timestamps),
            ..job
        };
        let err = read_only_processor(&as_timestamps, &aggregator).unwrap_err();
        assert!(format!("{:#}", err).contains("out-of-order"));
    }

    #[test]
    fn test_missing_required_fields() {
        let aggregator = TraceAggregator::new(runner_config()).unwrap();

        let no_inputs = JobSpec {
            processor: "single.throughput".to_string(),
            ..Default::default()
        };
        assert!(throughput_processor(&no_inputs, &aggregator).is_err());

        let no_latency_file = JobSpec {
            processor: "single.read_only".to_string(),
            ..Default::default()
        };
        let err = read_only_processor(&no_latency_file, &aggregator).unwrap_err();
        assert!(err.to_string().contains("latency_filename"));

        let no_switches = JobSpec {
            processor: "single.throughput".to_string(),
            input_tuple_list: vec![InputSpec {
                filename: PathBuf::from("missing.csv"),
                ..Default::default()
            }],
            ..Default::default()
        };
        let err = throughput_processor(&no_switches, &aggregator).unwrap_err();
        assert!(err.to_string().contains("num_switches"));
    }

    #[test]
    fn test_jobs_config_parsing() {
        let config = JobsConfig::from_json(
            r#"{
                "bucket_width_seconds": 1.0,
                "jobs": [
                    {
                        "processor": "single.latency_rtt",
                        "output_filename": "rtt.csv",
                        "input_tuple_list": [
                            { "delay_us": 2000, "filename": "rtt_2ms.csv", "format": "latencies" }
                        ]
                    }
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(config.aggregation.bucket_width_seconds, 1.0);
        assert_eq!(config.aggregation.warmup_fraction, 0.5);
        assert!(!config.continue_on_error);
        assert_eq!(config.jobs.len(), 1);
        let input = &config.jobs[0].input_tuple_list[0];
        assert_eq!(input.delay_us, Some(2000));
        assert_eq!(input.format, Some(SampleFormat::Latencies));
        assert_eq!(config.jobs[0].latency_format, None);
    }

    #[test]
    fn test_jobs_config_requires_jobs() {
        assert!(JobsConfig::from_json(r#"{ "warmup_fraction": 0.5 }"#).is_err());
    }
}
