//! Shared primitives for the graspeval pipeline: the tagged table
//! representation with quoted-CSV read/write, NaN-tolerant row
//! statistics, and identifier sanitization.

pub mod sanitize;
pub mod stats;
pub mod table;

pub use sanitize::sanitize_config_id;
pub use table::{read_table, write_table, Table, TableError};

use std::fs;
use std::io;
use std::path::Path;

/// Idempotent directory creation.
pub fn ensure_dir(path: &Path) -> io::Result<()> {
    fs::create_dir_all(path)
}
