//! Audit output: which runs were evaluated, which were not, and why.
//!
//! Two quoted-CSV files under the `EvaluatedData` output area, kept
//! readable with section banner rows the way the historical evaluation
//! sheets were laid out.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use csv::{QuoteStyle, WriterBuilder};
use graspeval_core::{ensure_dir, sanitize_config_id};

pub const USED_DATA_FILE: &str = "used_data.csv";
pub const NOT_USED_DATA_FILE: &str = "not_used_data.csv";

const END_OF_LIST: &str = "-- End of list.";

/// Final disposition of every discovered run.
#[derive(Debug, Default)]
pub struct Dispositions {
    /// Configuration identifier (raw) -> runs that fed the tables.
    pub used: BTreeMap<String, Vec<String>>,
    /// Missing the terminal training artifact.
    pub incomplete: Vec<String>,
    /// Configuration identifier could not be resolved.
    pub ungrouped: Vec<String>,
    /// Group already held the maximum number of runs.
    pub over_cap: Vec<String>,
    /// Metric log absent, malformed, or non-numeric.
    pub unreadable_series: Vec<String>,
    /// Update index disagreed with the group's reference column.
    pub misaligned_series: Vec<String>,
}

impl Dispositions {
    pub fn used_run_count(&self) -> usize {
        self.used.values().map(|runs| runs.len()).sum()
    }
}

/// Writes the `used_data.csv` / `not_used_data.csv` pair into `dir`.
pub fn write_audit(dir: &Path, dispositions: &Dispositions) -> Result<()> {
    ensure_dir(dir).with_context(|| format!("creating audit dir {}", dir.display()))?;
    write_used_data(dir, dispositions)?;
    write_not_used_data(dir, dispositions)?;
    Ok(())
}

fn audit_writer(path: &Path) -> Result<csv::Writer<std::fs::File>> {
    WriterBuilder::new()
        .quote_style(QuoteStyle::Always)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("opening audit file {}", path.display()))
}

fn write_used_data(dir: &Path, dispositions: &Dispositions) -> Result<()> {
    let path = dir.join(USED_DATA_FILE);
    let mut w = audit_writer(&path)?;

    w.write_record([
        "-- Overview about how many models per parameter-specification were used for evaluation:",
    ])?;
    w.write_record(["Parameter specification id:", "Count of models:"])?;
    for (id, runs) in &dispositions.used {
        w.write_record([sanitize_config_id(id), runs.len().to_string()])?;
    }
    w.write_record([END_OF_LIST])?;
    w.write_record([""])?;

    w.write_record(["-- Which models were used per parameter-specification:"])?;
    w.write_record(["Parameter specification id:", "Model:"])?;
    for (id, runs) in &dispositions.used {
        let id = sanitize_config_id(id);
        for run in runs {
            w.write_record([id.as_str(), run.as_str()])?;
        }
    }
    w.write_record([END_OF_LIST])?;

    w.flush()
        .with_context(|| format!("flushing {}", path.display()))?;
    Ok(())
}

fn write_not_used_data(dir: &Path, dispositions: &Dispositions) -> Result<()> {
    let path = dir.join(NOT_USED_DATA_FILE);
    let mut w = audit_writer(&path)?;

    let sections: [(&str, &Vec<String>); 5] = [
        ("-- Incomplete data sets:", &dispositions.incomplete),
        (
            "-- Excluded due to number of data directories to be included per param setting being exceeded:",
            &dispositions.over_cap,
        ),
        (
            "-- Excluded due to missing or unreadable parameter specification id:",
            &dispositions.ungrouped,
        ),
        (
            "-- Excluded due to absent or malformed training_eval.csv:",
            &dispositions.unreadable_series,
        ),
        (
            "-- Excluded due to update index misaligned with the parameter-specification group:",
            &dispositions.misaligned_series,
        ),
    ];
    for (idx, (banner, runs)) in sections.iter().enumerate() {
        if idx > 0 {
            w.write_record([""])?;
            w.write_record([""])?;
        }
        w.write_record([*banner])?;
        for run in runs.iter() {
            w.write_record([run.as_str()])?;
        }
        w.write_record([END_OF_LIST])?;
    }

    w.flush()
        .with_context(|| format!("flushing {}", path.display()))?;
    Ok(())
}
