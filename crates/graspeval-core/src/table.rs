//! Tagged tabular representation and quoted-CSV serialization.
//!
//! A [`Table`] is a text header row over numeric data rows, the only
//! two cell kinds the pipeline emits. Every field is written quoted so
//! that rereading a file yields the same string cells regardless of
//! whether a row is the header or data.

use std::fmt::Write as _;
use std::fs::File;
use std::path::{Path, PathBuf};

use csv::{QuoteStyle, ReaderBuilder, WriterBuilder};

use crate::sanitize::sanitize_config_id;

#[derive(Debug, thiserror::Error)]
pub enum TableError {
    #[error("io error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("csv error at {}: {source}", .path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("{}: file has no header row", .path.display())]
    MissingHeader { path: PathBuf },
    #[error("{}: row {row} has {found} cells, expected {expected}", .path.display())]
    Ragged {
        path: PathBuf,
        row: usize,
        found: usize,
        expected: usize,
    },
    #[error("{}: row {row} cell '{cell}' is not numeric", .path.display())]
    BadNumber {
        path: PathBuf,
        row: usize,
        cell: String,
    },
    #[error("column {column} has {found} rows, expected {expected}")]
    RaggedColumns {
        column: usize,
        found: usize,
        expected: usize,
    },
}

/// Header row of strings plus rectangular numeric data rows.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub header: Vec<String>,
    pub rows: Vec<Vec<f64>>,
}

impl Table {
    /// Builds a table from per-column vectors. Columns must share one
    /// length and there must be one header cell per column.
    pub fn from_columns(header: Vec<String>, columns: &[Vec<f64>]) -> Result<Self, TableError> {
        debug_assert_eq!(header.len(), columns.len());
        let rows_len = columns.first().map(|c| c.len()).unwrap_or(0);
        for (idx, col) in columns.iter().enumerate() {
            if col.len() != rows_len {
                return Err(TableError::RaggedColumns {
                    column: idx,
                    found: col.len(),
                    expected: rows_len,
                });
            }
        }
        let mut rows = Vec::with_capacity(rows_len);
        for i in 0..rows_len {
            rows.push(columns.iter().map(|c| c[i]).collect());
        }
        Ok(Table { header, rows })
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

/// Formats a numeric cell. Rust's shortest-roundtrip `Display` keeps
/// the written value parseable back to the identical bits; NaN renders
/// as `NaN`, which `f64::from_str` accepts.
pub fn format_cell(value: f64) -> String {
    let mut s = String::new();
    let _ = write!(s, "{}", value);
    s
}

/// Writes `table` to `<dir>/<sanitized base_name>.csv`, every field
/// quoted, one `\n`-terminated record per row. Creates `dir` when
/// missing and overwrites an existing file of the same name.
pub fn write_table(dir: &Path, base_name: &str, table: &Table) -> Result<PathBuf, TableError> {
    crate::ensure_dir(dir).map_err(|source| TableError::Io {
        path: dir.to_path_buf(),
        source,
    })?;
    let path = dir.join(format!("{}.csv", sanitize_config_id(base_name)));
    let mut writer = WriterBuilder::new()
        .quote_style(QuoteStyle::Always)
        .from_path(&path)
        .map_err(|source| TableError::Csv {
            path: path.clone(),
            source,
        })?;
    let csv_err = |source| TableError::Csv {
        path: path.clone(),
        source,
    };
    writer.write_record(&table.header).map_err(csv_err)?;
    for row in &table.rows {
        writer
            .write_record(row.iter().map(|v| format_cell(*v)))
            .map_err(|source| TableError::Csv {
                path: path.clone(),
                source,
            })?;
    }
    writer.flush().map_err(|source| TableError::Io {
        path: path.clone(),
        source,
    })?;
    Ok(path)
}

/// Reads a file written by [`write_table`]: first record becomes the
/// header, the rest parse as numeric rows of the same width.
pub fn read_table(path: &Path) -> Result<Table, TableError> {
    let file = File::open(path).map_err(|source| TableError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(file);
    let mut records = reader.records();
    let header: Vec<String> = match records.next() {
        Some(record) => record
            .map_err(|source| TableError::Csv {
                path: path.to_path_buf(),
                source,
            })?
            .iter()
            .map(|s| s.to_string())
            .collect(),
        None => {
            return Err(TableError::MissingHeader {
                path: path.to_path_buf(),
            })
        }
    };
    let mut rows = Vec::new();
    for (idx, record) in records.enumerate() {
        let record = record.map_err(|source| TableError::Csv {
            path: path.to_path_buf(),
            source,
        })?;
        if record.len() != header.len() {
            return Err(TableError::Ragged {
                path: path.to_path_buf(),
                row: idx + 1,
                found: record.len(),
                expected: header.len(),
            });
        }
        let mut row = Vec::with_capacity(record.len());
        for cell in record.iter() {
            let value = cell
                .trim()
                .parse::<f64>()
                .map_err(|_| TableError::BadNumber {
                    path: path.to_path_buf(),
                    row: idx + 1,
                    cell: cell.to_string(),
                })?;
            row.push(value);
        }
        rows.push(row);
    }
    Ok(Table { header, rows })
}
