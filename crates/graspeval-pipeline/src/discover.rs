//! Run discovery and completeness filtering.
//!
//! A run is one immediate subfolder of the results root. It counts as
//! complete when the folder itself contains the terminal training
//! artifact; everything else, including folders we cannot read, lands
//! on the incomplete list. The scan builds fresh output lists instead
//! of mutating the listing it walks.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Marker file written by the trainer only when a run finished.
pub const FINAL_MODEL_MARKER: &str = "final_model.zip";

/// One discovered run folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunDir {
    pub name: String,
    pub path: PathBuf,
}

/// Partition of the discovered runs by completeness.
#[derive(Debug, Default)]
pub struct RunScan {
    pub complete: Vec<RunDir>,
    pub incomplete: Vec<String>,
}

impl RunScan {
    pub fn discovered(&self) -> usize {
        self.complete.len() + self.incomplete.len()
    }
}

/// Scans the immediate subfolders of `root` and classifies each one.
/// Only a missing or unreadable `root` itself is an error.
pub fn scan_runs(root: &Path) -> Result<RunScan> {
    let mut scan = RunScan::default();
    for entry in WalkDir::new(root).min_depth(1).max_depth(1).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            // A failure scoped to one subfolder makes that run
            // incomplete; only the root itself is allowed to fail the
            // scan.
            Err(err) => match err.path().filter(|p| *p != root) {
                Some(path) => {
                    let name = path
                        .file_name()
                        .map(|n| n.to_string_lossy().to_string())
                        .unwrap_or_else(|| path.display().to_string());
                    warn!(run = %name, %err, "run folder unreadable, excluding run");
                    scan.incomplete.push(name);
                    continue;
                }
                None => {
                    return Err(err)
                        .with_context(|| format!("listing runs under {}", root.display()))
                }
            },
        };
        if !entry.file_type().is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_string();
        let path = entry.path().to_path_buf();
        if run_is_complete(&path) {
            debug!(run = %name, "run complete");
            scan.complete.push(RunDir { name, path });
        } else {
            warn!(run = %name, "incomplete data, excluding run");
            scan.incomplete.push(name);
        }
    }
    Ok(scan)
}

/// Non-recursive presence test for the terminal artifact. An
/// unreadable folder reads as incomplete rather than failing the scan.
fn run_is_complete(run_dir: &Path) -> bool {
    let entries = match fs::read_dir(run_dir) {
        Ok(entries) => entries,
        Err(err) => {
            warn!(run = %run_dir.display(), %err, "run folder unreadable");
            return false;
        }
    };
    for entry in entries.flatten() {
        if entry.file_name().to_string_lossy() == FINAL_MODEL_MARKER {
            return true;
        }
    }
    false
}
