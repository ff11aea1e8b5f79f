//! Loading one run's per-update metric log.

use std::path::{Path, PathBuf};

use graspeval_core::{read_table, TableError};

pub const TRAINING_EVAL_FILE: &str = "training_eval.csv";

/// Column count of `training_eval.csv`: update index, grasp count,
/// mean grasp time, std grasp time.
const SERIES_COLUMNS: usize = 4;

#[derive(Debug, thiserror::Error)]
pub enum SeriesError {
    #[error(transparent)]
    Table(#[from] TableError),
    #[error("{}: expected {SERIES_COLUMNS} columns, found {found}", .path.display())]
    ColumnCount { path: PathBuf, found: usize },
    #[error("{}: no data rows after header", .path.display())]
    Empty { path: PathBuf },
}

/// One run's metric log as parallel numeric columns.
#[derive(Debug, Clone)]
pub struct MetricSeries {
    pub updates: Vec<f64>,
    pub grasps: Vec<f64>,
    pub mean_times: Vec<f64>,
    pub std_times: Vec<f64>,
}

impl MetricSeries {
    pub fn len(&self) -> usize {
        self.updates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.updates.is_empty()
    }
}

/// Reads `<run>/training_eval.csv`, strips the header row and converts
/// the body to numeric columns. Any shape or parse defect is an error
/// for this run; the caller decides whether the group continues
/// without it.
pub fn load_series(run_dir: &Path) -> Result<MetricSeries, SeriesError> {
    let path = run_dir.join(TRAINING_EVAL_FILE);
    let table = read_table(&path)?;
    if table.header.len() != SERIES_COLUMNS {
        return Err(SeriesError::ColumnCount {
            path,
            found: table.header.len(),
        });
    }
    if table.rows.is_empty() {
        return Err(SeriesError::Empty { path });
    }
    let column = |idx: usize| table.rows.iter().map(|row| row[idx]).collect();
    Ok(MetricSeries {
        updates: column(0),
        grasps: column(1),
        mean_times: column(2),
        std_times: column(3),
    })
}
