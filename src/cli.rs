use crate::latency::SampleFormat;
use crate::pipeline::AggregationConfig;
use crate::results::{ResultLayout, ReportUnit};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Trace Aggregator - steady-state throughput and latency from per-worker traces
#[derive(Parser, Debug)]
#[clap(version, about, long_about = None)]
pub struct Args {
    #[clap(subcommand)]
    pub command: Command,

    /// Verbose output (debug-level logging)
    #[clap(short = 'v', long, global = true, default_value_t = false)]
    pub verbose: bool,

    /// Also write logs, without colors, to this file
    #[clap(long, global = true)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run every job listed in a JSON configuration file
    Process {
        /// Configuration filename (JSON)
        #[clap(long = "cfg")]
        cfg: PathBuf,

        /// Run jobs one at a time instead of in parallel
        #[clap(long, default_value_t = false)]
        sequential: bool,

        /// Continue running other jobs even if one fails
        #[clap(long, default_value_t = false)]
        continue_on_error: bool,
    },

    /// Print the throughput series (ops/s) of one trace file
    Throughput {
        /// Trace file: one line per worker, comma-separated ns timestamps
        trace_file: PathBuf,

        #[clap(flatten)]
        params: AggregationArgs,
    },

    /// Summarize the latency samples of one trace file
    Latency {
        /// Trace file: one line per worker, comma-separated values
        trace_file: PathBuf,

        #[clap(flatten)]
        params: AggregationArgs,

        /// What the numbers in the trace file represent
        #[clap(long, value_enum, default_value_t = SampleFormat::Timestamps)]
        format: SampleFormat,

        /// Print every latency sample instead of a summary
        #[clap(long, default_value_t = false)]
        raw: bool,
    },

    /// Summarize every row of a results file as JSON
    Summarize {
        /// Results file: `label,value,value,...` per line
        results_file: PathBuf,

        /// Unit to report values in
        #[clap(long, value_enum, default_value_t = ReportUnit::Nanoseconds)]
        unit: ReportUnit,

        /// Label columns leading each line of the results file
        #[clap(long, value_enum, default_value_t = ResultLayout::Labeled)]
        layout: ResultLayout,

        /// Read fairness results and report each principal's share per run
        #[clap(long, default_value_t = false, conflicts_with_all = ["unit", "layout"])]
        fairness: bool,

        /// Percentiles to report in addition to p5/p50/p95
        #[clap(long, num_args = 1.., default_values_t = vec![99.0])]
        percentiles: Vec<f64>,

        /// Write the JSON report here instead of stdout
        #[clap(short = 'o', long)]
        output_file: Option<PathBuf>,
    },
}

/// Aggregation parameters shared by the single-file subcommands
#[derive(clap::Args, Debug, Clone)]
pub struct AggregationArgs {
    /// Fraction of warmup to discard (0 to 1)
    #[clap(short = 'w', long, default_value_t = crate::defaults::WARMUP_FRACTION)]
    pub warmup_fraction: f64,

    /// Throughput bucket width in seconds
    #[clap(short = 'b', long, default_value_t = crate::defaults::BUCKET_WIDTH_SECONDS)]
    pub bucket_width_seconds: f64,

    /// Percentiles to calculate for summaries
    #[clap(long, num_args = 1.., default_values_t = vec![5.0, 50.0, 95.0])]
    pub percentiles: Vec<f64>,
}

impl From<&AggregationArgs> for AggregationConfig {
    fn from(args: &AggregationArgs) -> Self {
        Self {
            warmup_fraction: args.warmup_fraction,
            bucket_width_seconds: args.bucket_width_seconds,
            percentiles: args.percentiles.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_throughput_defaults() {
        let args = Args::parse_from(["trace-aggregator", "throughput", "trace.csv"]);
        match args.command {
            Command::Throughput { trace_file, params } => {
                assert_eq!(trace_file, PathBuf::from("trace.csv"));
                let config = AggregationConfig::from(&params);
                assert_eq!(config, AggregationConfig::default());
            }
            other => panic!("unexpected command {:?}", other),
        }
        assert!(!args.verbose);
    }

    #[test]
    fn test_latency_options() {
        let args = Args::parse_from([
            "trace-aggregator",
            "latency",
            "lat.csv",
            "-w",
            "0",
            "--format",
            "latencies",
            "--raw",
            "-v",
        ]);
        match args.command {
            Command::Latency {
                params,
                format,
                raw,
                ..
            } => {
                assert_eq!(params.warmup_fraction, 0.0);
                assert_eq!(format, SampleFormat::Latencies);
                assert!(raw);
            }
            other => panic!("unexpected command {:?}", other),
        }
        assert!(args.verbose);
    }

    #[test]
    fn test_process_and_summarize_options() {
        let args = Args::parse_from(["trace-aggregator", "process", "--cfg", "jobs.json"]);
        assert!(matches!(
            args.command,
            Command::Process { ref cfg, sequential: false, continue_on_error: false }
                if cfg == &PathBuf::from("jobs.json")
        ));

        let args = Args::parse_from([
            "trace-aggregator",
            "summarize",
            "out.csv",
            "--unit",
            "ms",
            "--percentiles",
            "90",
            "99.9",
        ]);
        match args.command {
            Command::Summarize {
                unit,
                percentiles,
                layout,
                fairness,
                ..
            } => {
                assert_eq!(unit, ReportUnit::Milliseconds);
                assert_eq!(percentiles, vec![90.0, 99.9]);
                assert_eq!(layout, ResultLayout::Labeled);
                assert!(!fairness);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_summarize_layouts() {
        let args = Args::parse_from([
            "trace-aggregator",
            "summarize",
            "rtt.csv",
            "--layout",
            "speculation-rtt",
        ]);
        assert!(matches!(
            args.command,
            Command::Summarize {
                layout: ResultLayout::SpeculationRtt,
                fairness: false,
                ..
            }
        ));

        let args = Args::parse_from(["trace-aggregator", "summarize", "fair.csv", "--fairness"]);
        assert!(matches!(
            args.command,
            Command::Summarize { fairness: true, .. }
        ));

        let conflicting = Args::try_parse_from([
            "trace-aggregator",
            "summarize",
            "fair.csv",
            "--fairness",
            "--unit",
            "ms",
        ]);
        assert!(conflicting.is_err());
    }
}
