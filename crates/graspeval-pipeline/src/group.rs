//! Grouping complete runs by configuration identifier under a size cap.

use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::discover::RunDir;
use crate::metadata::config_id_for_run;

/// Default cap on how many runs contribute to one group.
pub const DEFAULT_GROUP_CAP: usize = 5;

/// Grouping outcome: identifier -> member runs (encounter order, at
/// most the cap), plus the discarded runs partitioned by reason.
#[derive(Debug, Default)]
pub struct Grouping {
    pub groups: BTreeMap<String, Vec<RunDir>>,
    /// Runs whose configuration identifier could not be resolved.
    pub ungrouped: Vec<String>,
    /// Runs arriving after their group was already full.
    pub over_cap: Vec<String>,
}

impl Grouping {
    pub fn used_run_count(&self) -> usize {
        self.groups.values().map(|members| members.len()).sum()
    }
}

/// Assigns each complete run to its identifier's group, first-seen runs
/// winning the (at most `cap`) slots. Later arrivals for a full group
/// and runs without an identifier are recorded, never silently dropped.
pub fn group_runs(complete: &[RunDir], cap: usize) -> Grouping {
    let mut grouping = Grouping::default();
    for run in complete {
        let Some(config_id) = config_id_for_run(&run.path) else {
            warn!(run = %run.name, "no configuration identifier, discarding");
            grouping.ungrouped.push(run.name.clone());
            continue;
        };
        let members = grouping.groups.entry(config_id.clone()).or_default();
        if members.len() < cap {
            debug!(run = %run.name, config = %config_id, "grouped");
            members.push(run.clone());
        } else {
            warn!(run = %run.name, config = %config_id, cap, "group full, discarding");
            grouping.over_cap.push(run.name.clone());
        }
    }
    grouping
}
