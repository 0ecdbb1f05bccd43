//! # Trace Aggregator - Main Entry Point
//!
//! Command-line front end for the aggregation library:
//!
//! - `process --cfg jobs.json`: run configuration-driven post-processing jobs
//! - `throughput <trace>`: print the steady-state ops/s series of one trace file
//! - `latency <trace>`: summarize (or dump) the latency samples of one trace file
//! - `summarize <results>`: JSON statistics for every row of a results file,
//!   or per-principal shares with `--fairness`
//!
//! The processor dispatch table is built here and passed to the job runner;
//! adding a processor means registering it in `build_registry`.
//!
//! Errors propagate as `anyhow::Error`, so a failing run exits non-zero with
//! the full context chain.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::Path;
use tracing::{info, warn};
use trace_aggregator::{
    cli::{AggregationArgs, Args, Command},
    fairness::{read_fairness_results, FairnessSummary},
    latency::SampleFormat,
    logging::init_logging,
    results::{read_results_file_with_layout, ReportUnit, ResultLayout, SummaryReport},
    trace::read_trace_file,
    utils::{format_duration_ns, format_rate, join_numbers},
    AggregationConfig, JobRunner, JobsConfig, ProcessorRegistry, TraceAggregator,
};

fn main() -> Result<()> {
    let args = Args::parse();
    // Keep the guard alive so the file writer flushes on exit.
    let _log_guard = init_logging(args.verbose, args.log_file.as_deref())?;

    info!("Starting trace aggregator {}", trace_aggregator::VERSION);

    match &args.command {
        Command::Process {
            cfg,
            sequential,
            continue_on_error,
        } => run_process(cfg, *sequential, *continue_on_error),
        Command::Throughput { trace_file, params } => run_throughput(trace_file, params),
        Command::Latency {
            trace_file,
            params,
            format,
            raw,
        } => run_latency(trace_file, params, *format, *raw),
        Command::Summarize {
            results_file,
            fairness: true,
            output_file,
            ..
        } => run_summarize_fairness(results_file, output_file.as_deref()),
        Command::Summarize {
            results_file,
            unit,
            percentiles,
            layout,
            fairness: false,
            output_file,
        } => run_summarize(
            results_file,
            *unit,
            *layout,
            percentiles,
            output_file.as_deref(),
        ),
    }
}

/// Composition root for the processor dispatch table
fn build_registry() -> ProcessorRegistry {
    ProcessorRegistry::with_builtin()
}

fn run_process(cfg: &Path, sequential: bool, continue_on_error: bool) -> Result<()> {
    let config = JobsConfig::from_file(cfg)?;
    let registry = build_registry();

    let mut runner = JobRunner::new(&registry, config.aggregation.clone())?;
    if sequential {
        runner = runner.sequential();
    }

    let outcomes = runner.run_all(&config.jobs, continue_on_error || config.continue_on_error)?;
    if outcomes.len() < config.jobs.len() {
        warn!(
            "{} of {} jobs failed",
            config.jobs.len() - outcomes.len(),
            config.jobs.len()
        );
    }
    info!("Completed {} jobs", outcomes.len());
    Ok(())
}

fn run_throughput(trace_file: &Path, params: &AggregationArgs) -> Result<()> {
    let aggregator = TraceAggregator::new(AggregationConfig::from(params))?;
    let trace_set = read_trace_file(trace_file)?;
    let series = aggregator.throughput(&trace_set)?;
    let rates = series.rates();

    info!(
        "Window [{}, {}] ({}), {} buckets",
        series.window.start,
        series.window.end,
        format_duration_ns(series.window.duration_ns()),
        rates.len()
    );
    if let Ok(summary) = aggregator.summarize(&rates) {
        info!("Median throughput: {}", format_rate(summary.median));
    } else {
        warn!("No complete bucket inside the steady-state window");
    }

    println!("{}", join_numbers(&rates));
    Ok(())
}

fn run_latency(
    trace_file: &Path,
    params: &AggregationArgs,
    format: SampleFormat,
    raw: bool,
) -> Result<()> {
    let aggregator = TraceAggregator::new(AggregationConfig::from(params))?;
    let trace_set = read_trace_file(trace_file)?;
    let latencies = aggregator.latencies(&trace_set, format)?;

    if raw {
        println!("{}", join_numbers(&latencies));
        return Ok(());
    }

    let values: Vec<f64> = latencies.iter().map(|&v| v as f64).collect();
    let summary = aggregator.summarize(&values)?;
    info!(
        "{} samples, median {}",
        summary.count,
        format_duration_ns(summary.median.round() as u64)
    );
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn run_summarize(
    results_file: &Path,
    unit: ReportUnit,
    layout: ResultLayout,
    percentiles: &[f64],
    output_file: Option<&Path>,
) -> Result<()> {
    let rows = read_results_file_with_layout(results_file, layout)?;
    let report = SummaryReport::build(results_file, &rows, unit, percentiles)?;

    match output_file {
        Some(path) => report.write_json(path)?,
        None => println!("{}", report.to_json()?),
    }
    Ok(())
}

fn run_summarize_fairness(results_file: &Path, output_file: Option<&Path>) -> Result<()> {
    let summaries: Vec<FairnessSummary> = read_fairness_results(results_file)?
        .iter()
        .map(FairnessSummary::from)
        .collect();
    for summary in &summaries {
        info!(
            "Run {} (wound-wait {}): {} operations",
            summary.label, summary.wound_wait_on, summary.operations
        );
    }

    let json = serde_json::to_string_pretty(&summaries)?;
    match output_file {
        Some(path) => {
            std::fs::write(path, json)
                .with_context(|| format!("Failed to write report {}", path.display()))?;
            info!("Report written to: {:?}", path);
        }
        None => println!("{}", json),
    }
    Ok(())
}
