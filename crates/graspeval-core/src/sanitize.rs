//! Total mapping from configuration identifiers to filesystem-safe
//! base names.
//!
//! Identifiers arrive as the raw value of `provided_params_file`, which
//! historically looks like `ParameterSettings/ppo_lr_0.001.json`. The
//! mapping strips that known prefix and extension, then replaces every
//! remaining path separator and dot with `_`. The result contains no
//! `/`, `\` or `.` and is stable for any input string.

const PARAMS_DIR_PREFIX: &str = "ParameterSettings/";
const PARAMS_EXTENSION: &str = ".json";

pub fn sanitize_config_id(id: &str) -> String {
    let id = id.strip_prefix(PARAMS_DIR_PREFIX).unwrap_or(id);
    let id = id.strip_suffix(PARAMS_EXTENSION).unwrap_or(id);
    id.chars()
        .map(|c| match c {
            '/' | '\\' | '.' => '_',
            other => other,
        })
        .collect()
}
