//! Fairness traces: which of two principals executed each operation.
//!
//! Entries have the form `<principal>|<timestamp>` and are comma-separated,
//! with an optional trailing comma. The principal is `0` or `1`.
//!
//! The `single.fairness` processor writes one results row per run, labelled
//! `0` for wound-wait scheduling and `1` for the alternative algorithm:
//!
//! ```text
//! 0,0|100,1|150,0|175
//! 1,1|90,1|120,0|160
//! ```

use crate::error::{AggregationError, MalformedInput};
use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FairnessEntry {
    pub principal: u8,
    pub timestamp: u64,
}

/// Ordered operations of a two-principal fairness experiment
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FairnessSequence {
    entries: Vec<FairnessEntry>,
}

impl FairnessSequence {
    pub fn parse(text: &str) -> Result<Self, AggregationError> {
        let mut entries = Vec::new();
        for (index, raw) in text
            .split(',')
            .map(str::trim)
            .filter(|raw| !raw.is_empty())
            .enumerate()
        {
            let malformed = || MalformedInput::InvalidFairnessEntry {
                index,
                entry: raw.to_string(),
            };
            let (principal, timestamp) = raw.split_once('|').ok_or_else(malformed)?;
            let principal = match principal.trim() {
                "0" => 0,
                "1" => 1,
                _ => return Err(malformed().into()),
            };
            let timestamp = timestamp.trim().parse::<u64>().map_err(|_| malformed())?;
            entries.push(FairnessEntry {
                principal,
                timestamp,
            });
        }
        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[FairnessEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The 0/1 label sequence, in execution order
    pub fn principals(&self) -> Vec<u8> {
        self.entries.iter().map(|e| e.principal).collect()
    }

    /// Fraction of operations executed by `principal`, `None` when empty
    pub fn share_of(&self, principal: u8) -> Option<f64> {
        if self.entries.is_empty() {
            return None;
        }
        let ran = self
            .entries
            .iter()
            .filter(|e| e.principal == principal)
            .count();
        Some(ran as f64 / self.entries.len() as f64)
    }

    /// Serialize back to `<principal>|<timestamp>` fields
    pub fn to_fields(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|e| format!("{}|{}", e.principal, e.timestamp))
            .collect()
    }
}

pub fn read_fairness_file(path: &Path) -> Result<FairnessSequence> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read fairness file {}", path.display()))?;
    FairnessSequence::parse(&text)
        .with_context(|| format!("Failed to parse fairness file {}", path.display()))
}

/// Results-row label of a run: 0 with wound-wait scheduling, 1 without
pub fn fairness_label(wound_wait_on: bool) -> u8 {
    if wound_wait_on {
        0
    } else {
        1
    }
}

/// One labelled run of a fairness results file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FairnessRow {
    pub label: u8,
    pub sequence: FairnessSequence,
}

/// Parse a fairness results document, one labelled run per non-blank line
pub fn parse_fairness_results(text: &str) -> Result<Vec<FairnessRow>> {
    let mut rows = Vec::new();
    for (line_no, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let (label, entries) = line.split_once(',').unwrap_or((line, ""));
        let label = match label.trim() {
            "0" => 0,
            "1" => 1,
            other => bail!("Invalid fairness label {:?} on line {}", other, line_no + 1),
        };
        let sequence = FairnessSequence::parse(entries)
            .with_context(|| format!("Invalid fairness entries on line {}", line_no + 1))?;
        rows.push(FairnessRow { label, sequence });
    }
    Ok(rows)
}

pub fn read_fairness_results(path: &Path) -> Result<Vec<FairnessRow>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read fairness results {}", path.display()))?;
    parse_fairness_results(&text)
        .with_context(|| format!("Failed to parse fairness results {}", path.display()))
}

/// Principal sequence of the run that used (or did not use) wound-wait
pub fn read_fairness_row(path: &Path, wound_wait_on: bool) -> Result<FairnessSequence> {
    let label = fairness_label(wound_wait_on);
    read_fairness_results(path)?
        .into_iter()
        .find(|row| row.label == label)
        .map(|row| row.sequence)
        .ok_or_else(|| anyhow!("{} has no fairness run labelled {}", path.display(), label))
}

/// Share of operations each principal executed in one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FairnessSummary {
    pub label: u8,
    pub wound_wait_on: bool,
    pub operations: usize,
    pub principal_0_share: Option<f64>,
    pub principal_1_share: Option<f64>,
}

impl From<&FairnessRow> for FairnessSummary {
    fn from(row: &FairnessRow) -> Self {
        Self {
            label: row.label,
            wound_wait_on: row.label == fairness_label(true),
            operations: row.sequence.len(),
            principal_0_share: row.sequence.share_of(0),
            principal_1_share: row.sequence.share_of(1),
        }
    }
}
