//! Per-run metadata: which parameter specification file drove a run.

use std::fs;
use std::path::Path;

use serde_json::Value;
use tracing::debug;

pub const PARAMS_FILE: &str = "params.json";
pub const PARAMS_FILE_KEY: &str = "provided_params_file";

/// Reads the configuration identifier out of `<run>/params.json`.
///
/// A missing file, unparsable JSON, absent key, or non-string value all
/// resolve to `None`; the caller treats such a run as ungroupable.
/// Nothing here is allowed to fail the scan.
pub fn config_id_for_run(run_dir: &Path) -> Option<String> {
    let path = run_dir.join(PARAMS_FILE);
    let bytes = match fs::read(&path) {
        Ok(bytes) => bytes,
        Err(err) => {
            debug!(path = %path.display(), %err, "params file unreadable");
            return None;
        }
    };
    let value: Value = match serde_json::from_slice(&bytes) {
        Ok(value) => value,
        Err(err) => {
            debug!(path = %path.display(), %err, "params file unparsable");
            return None;
        }
    };
    value
        .get(PARAMS_FILE_KEY)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
}
