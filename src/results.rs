use crate::metrics::{self, SummaryResult};
use anyhow::{bail, Context, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::path::Path;
use tracing::{debug, info, warn};

/// One line of a results file: `label,field,field,...`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultRow {
    pub label: String,
    pub fields: Vec<String>,
}

impl ResultRow {
    pub fn new(label: impl Into<String>, fields: Vec<String>) -> Self {
        Self {
            label: label.into(),
            fields,
        }
    }

    /// Row of numeric values under a numeric or textual label
    pub fn numeric<L: Display, T: Display>(label: L, values: &[T]) -> Self {
        Self::new(
            label.to_string(),
            values.iter().map(|v| v.to_string()).collect(),
        )
    }

    pub fn to_line(&self) -> String {
        if self.fields.is_empty() {
            format!("{},", self.label)
        } else {
            format!("{},{}", self.label, self.fields.join(","))
        }
    }
}

/// Write `rows` to `path`, one line each, replacing any existing file
pub fn write_results_file(path: &Path, rows: &[ResultRow]) -> Result<()> {
    let mut contents = String::new();
    for row in rows {
        contents.push_str(&row.to_line());
        contents.push('\n');
    }
    std::fs::write(path, contents)
        .with_context(|| format!("Failed to write results file {}", path.display()))?;

    info!("Wrote {} result rows to {:?}", rows.len(), path);
    Ok(())
}

/// How the leading label columns of a numeric results file are laid out
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultLayout {
    /// `label,value,...` as written by the throughput and latency processors
    #[default]
    #[clap(name = "labeled")]
    Labeled,

    /// `<speculation 0|1>,<rtt_ns>,value,...` from speculation RTT runs
    #[clap(name = "speculation-rtt")]
    SpeculationRtt,
}

/// A results line parsed back into numbers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumericRow {
    pub label: f64,
    /// Second label column, the artificial RTT in ns for speculation runs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sublabel: Option<f64>,
    pub values: Vec<f64>,
}

fn parse_field(field: &str, line: usize) -> Result<f64> {
    let value = field
        .parse::<f64>()
        .with_context(|| format!("Invalid number {:?} on line {}", field, line))?;
    if !value.is_finite() {
        bail!("Non-finite number {:?} on line {}", field, line);
    }
    Ok(value)
}

/// Parse a `label,value,...` results document, sorted by label ascending
pub fn parse_results(text: &str) -> Result<Vec<NumericRow>> {
    parse_results_with_layout(text, ResultLayout::Labeled)
}

/// Parse a numeric results document, sorted by its label columns ascending
pub fn parse_results_with_layout(text: &str, layout: ResultLayout) -> Result<Vec<NumericRow>> {
    let mut rows = Vec::new();
    for (line_no, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let line_no = line_no + 1;
        let mut fields = line
            .split(',')
            .map(str::trim)
            .filter(|field| !field.is_empty())
            .map(|field| parse_field(field, line_no));

        let label = match fields.next() {
            Some(label) => label?,
            None => continue,
        };
        let sublabel = match layout {
            ResultLayout::Labeled => None,
            ResultLayout::SpeculationRtt => {
                if label != 0.0 && label != 1.0 {
                    bail!("Speculation flag {} on line {} is not 0 or 1", label, line_no);
                }
                match fields.next() {
                    Some(rtt) => Some(rtt?),
                    None => bail!("Line {} is missing the RTT column", line_no),
                }
            }
        };
        let values = fields.collect::<Result<Vec<_>>>()?;
        rows.push(NumericRow {
            label,
            sublabel,
            values,
        });
    }

    rows.sort_by(|a, b| {
        a.label
            .total_cmp(&b.label)
            .then_with(|| a.sublabel.unwrap_or(0.0).total_cmp(&b.sublabel.unwrap_or(0.0)))
    });
    Ok(rows)
}

pub fn read_results_file(path: &Path) -> Result<Vec<NumericRow>> {
    read_results_file_with_layout(path, ResultLayout::Labeled)
}

pub fn read_results_file_with_layout(path: &Path, layout: ResultLayout) -> Result<Vec<NumericRow>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read results file {}", path.display()))?;
    parse_results_with_layout(&text, layout)
        .with_context(|| format!("Failed to parse results file {}", path.display()))
}

/// Unit in which a summary report presents its values
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportUnit {
    /// Latency samples left in nanoseconds
    #[clap(name = "ns")]
    Nanoseconds,

    /// Latency samples converted to milliseconds
    #[clap(name = "ms")]
    Milliseconds,

    /// Throughput samples left in operations per second
    #[clap(name = "ops")]
    OpsPerSecond,

    /// Throughput samples converted to thousands of operations per second
    #[clap(name = "kops")]
    KopsPerSecond,
}

impl ReportUnit {
    /// Factor that converts a raw sample into this unit
    pub fn factor(&self) -> f64 {
        match self {
            ReportUnit::Nanoseconds | ReportUnit::OpsPerSecond => 1.0,
            ReportUnit::Milliseconds => 1e-6,
            ReportUnit::KopsPerSecond => 1e-3,
        }
    }
}

impl std::fmt::Display for ReportUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReportUnit::Nanoseconds => write!(f, "ns"),
            ReportUnit::Milliseconds => write!(f, "ms"),
            ReportUnit::OpsPerSecond => write!(f, "ops/s"),
            ReportUnit::KopsPerSecond => write!(f, "kops/s"),
        }
    }
}

/// System information for reproducibility
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemInfo {
    pub os: String,
    pub architecture: String,
    pub cpu_cores: usize,
    pub tool_version: String,
}

impl Default for SystemInfo {
    fn default() -> Self {
        Self {
            os: std::env::consts::OS.to_string(),
            architecture: std::env::consts::ARCH.to_string(),
            cpu_cores: num_cpus::get(),
            tool_version: crate::VERSION.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    pub version: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub source: String,
    pub unit: ReportUnit,
    pub system_info: SystemInfo,
}

/// Summary of one results row; `summary` is `None` when the row had no samples
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RowSummary {
    pub label: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sublabel: Option<f64>,
    pub sample_count: usize,
    pub summary: Option<SummaryResult>,
}

/// Per-row statistics for a whole results file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryReport {
    pub metadata: ReportMetadata,
    pub rows: Vec<RowSummary>,
}

impl SummaryReport {
    pub fn build(
        source: &Path,
        rows: &[NumericRow],
        unit: ReportUnit,
        percentiles: &[f64],
    ) -> Result<Self> {
        let mut summaries = Vec::with_capacity(rows.len());
        for row in rows {
            let summary = if row.values.is_empty() {
                warn!("Row {} has no samples; leaving its summary empty", row.label);
                None
            } else {
                let summary = metrics::summarize(&row.values, percentiles)
                    .with_context(|| format!("Failed to summarize row {}", row.label))?;
                Some(summary.scaled(unit.factor()))
            };
            summaries.push(RowSummary {
                label: row.label,
                sublabel: row.sublabel,
                sample_count: row.values.len(),
                summary,
            });
        }

        debug!("Summarized {} rows from {:?}", summaries.len(), source);
        Ok(Self {
            metadata: ReportMetadata {
                version: crate::VERSION.to_string(),
                timestamp: chrono::Utc::now(),
                source: source.display().to_string(),
                unit,
                system_info: SystemInfo::default(),
            },
            rows: summaries,
        })
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn write_json(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_json()?)
            .with_context(|| format!("Failed to write report {}", path.display()))?;
        info!("Report written to: {:?}", path);
        Ok(())
    }
}
