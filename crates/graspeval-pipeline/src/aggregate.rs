//! Cross-run aggregation: alignment validation, row-wise statistics,
//! per-group detail tables, and the cross-group summary accumulator.

use graspeval_core::stats::{row_nan_mean, row_nan_std};
use graspeval_core::{Table, TableError};
use tracing::warn;

use crate::discover::RunDir;
use crate::series::MetricSeries;

pub const MEAN_OVER_GRASPS: &str = "Mean_over_grasps";
pub const STD_OVER_GRASPS: &str = "Std_over_grasps";
pub const MEAN_OVER_MEAN_TIMES: &str = "Mean_over_mean_grasp_times";
pub const MEAN_OVER_STD_TIMES: &str = "Mean_over_std_grasp_times";

pub const SUMMARY_GRASP_MEANS: &str = "MeansOverGrasps";
pub const SUMMARY_GRASP_STDS: &str = "StdOverGrasps";
pub const SUMMARY_TIME_MEAN_MEANS: &str = "MeanOverMeanGraspingTimes";
pub const SUMMARY_TIME_STD_MEANS: &str = "MeanOverStdOfGraspingTimes";

const UPDATES_LABEL: &str = "Updates";

/// One group member with its loaded metric series.
#[derive(Debug)]
pub struct GroupMember {
    pub run: RunDir,
    pub series: MetricSeries,
}

/// Members whose update columns match the group's reference column,
/// plus the names of the members that did not.
#[derive(Debug)]
pub struct AlignedGroup {
    pub members: Vec<GroupMember>,
    pub rejected: Vec<String>,
}

/// Validates the alignment precondition: every member's update column
/// must equal the first member's column in length and values. Members
/// that disagree are rejected so that the remaining aggregation is
/// well-defined; truncating or zipping mismatched rows is never done.
pub fn validate_alignment(members: Vec<GroupMember>) -> AlignedGroup {
    let mut aligned: Vec<GroupMember> = Vec::with_capacity(members.len());
    let mut rejected = Vec::new();
    for member in members {
        let matches_reference = aligned
            .first()
            .map(|reference| reference.series.updates == member.series.updates)
            .unwrap_or(true);
        if matches_reference {
            aligned.push(member);
        } else {
            warn!(
                run = %member.run.name,
                expected_rows = aligned[0].series.len(),
                found_rows = member.series.len(),
                "update index misaligned with group, rejecting run"
            );
            rejected.push(member.run.name.clone());
        }
    }
    AlignedGroup {
        members: aligned,
        rejected,
    }
}

/// The group's derived columns, carried into the global summaries.
#[derive(Debug, Clone)]
pub struct DerivedColumns {
    pub updates: Vec<f64>,
    pub grasp_mean: Vec<f64>,
    pub grasp_std: Vec<f64>,
    pub mean_time_mean: Vec<f64>,
    pub std_time_mean: Vec<f64>,
}

/// Per-group detail tables plus the derived columns.
#[derive(Debug)]
pub struct GroupAggregate {
    /// Member grasp counts with mean and std columns appended.
    pub grasps: Table,
    /// Member mean grasp times with the mean column appended.
    pub mean_times: Table,
    /// Member std grasp times with the mean column appended.
    pub std_times: Table,
    pub derived: DerivedColumns,
}

/// Aggregates one aligned, non-empty group: stacks each metric family's
/// member columns side by side and appends the row-wise NaN-tolerant
/// reductions.
pub fn aggregate_group(members: &[GroupMember]) -> Result<GroupAggregate, TableError> {
    debug_assert!(!members.is_empty());
    let run_names: Vec<String> = members.iter().map(|m| m.run.name.clone()).collect();
    let updates = members[0].series.updates.clone();

    let grasp_cols: Vec<Vec<f64>> = members.iter().map(|m| m.series.grasps.clone()).collect();
    let mean_time_cols: Vec<Vec<f64>> =
        members.iter().map(|m| m.series.mean_times.clone()).collect();
    let std_time_cols: Vec<Vec<f64>> =
        members.iter().map(|m| m.series.std_times.clone()).collect();

    let grasp_mean = row_nan_mean(&grasp_cols);
    let grasp_std = row_nan_std(&grasp_cols);
    let mean_time_mean = row_nan_mean(&mean_time_cols);
    let std_time_mean = row_nan_mean(&std_time_cols);

    let grasps = detail_table(
        &run_names,
        grasp_cols,
        &[
            (MEAN_OVER_GRASPS, grasp_mean.clone()),
            (STD_OVER_GRASPS, grasp_std.clone()),
        ],
    )?;
    let mean_times = detail_table(
        &run_names,
        mean_time_cols,
        &[(MEAN_OVER_MEAN_TIMES, mean_time_mean.clone())],
    )?;
    let std_times = detail_table(
        &run_names,
        std_time_cols,
        &[(MEAN_OVER_STD_TIMES, std_time_mean.clone())],
    )?;

    Ok(GroupAggregate {
        grasps,
        mean_times,
        std_times,
        derived: DerivedColumns {
            updates,
            grasp_mean,
            grasp_std,
            mean_time_mean,
            std_time_mean,
        },
    })
}

fn detail_table(
    run_names: &[String],
    mut columns: Vec<Vec<f64>>,
    appended: &[(&str, Vec<f64>)],
) -> Result<Table, TableError> {
    let mut header: Vec<String> = run_names.to_vec();
    for (label, column) in appended {
        header.push((*label).to_string());
        columns.push(column.clone());
    }
    Table::from_columns(header, &columns)
}

/// Explicit accumulator for the four global summaries, owned by the
/// pipeline driver and fed one group at a time. The first folded group
/// fixes the shared update column; a later group whose rows do not
/// match it cannot be represented in a rectangular summary and is
/// reported back to the caller instead of being folded.
#[derive(Debug, Default)]
pub struct SummaryAccumulator {
    updates: Option<Vec<f64>>,
    grasp_means: Vec<(String, Vec<f64>)>,
    grasp_stds: Vec<(String, Vec<f64>)>,
    time_mean_means: Vec<(String, Vec<f64>)>,
    time_std_means: Vec<(String, Vec<f64>)>,
}

impl SummaryAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds one group's derived columns under its sanitized
    /// identifier. Returns false when the group's update column does
    /// not match the accumulator's shared column.
    pub fn fold(&mut self, sanitized_id: &str, derived: &DerivedColumns) -> bool {
        match &self.updates {
            None => self.updates = Some(derived.updates.clone()),
            Some(shared) if *shared == derived.updates => {}
            Some(_) => return false,
        }
        let id = sanitized_id.to_string();
        self.grasp_means.push((id.clone(), derived.grasp_mean.clone()));
        self.grasp_stds.push((id.clone(), derived.grasp_std.clone()));
        self.time_mean_means
            .push((id.clone(), derived.mean_time_mean.clone()));
        self.time_std_means.push((id, derived.std_time_mean.clone()));
        true
    }

    /// Assembles the four summary tables, each keyed by the shared
    /// update column. With no folded groups the tables are header-only.
    pub fn into_summary_tables(self) -> Result<Vec<(&'static str, Table)>, TableError> {
        let updates = self.updates.unwrap_or_default();
        let assemble = |keyed: Vec<(String, Vec<f64>)>| -> Result<Table, TableError> {
            let mut header = vec![UPDATES_LABEL.to_string()];
            let mut columns = vec![updates.clone()];
            for (id, column) in keyed {
                header.push(id);
                columns.push(column);
            }
            Table::from_columns(header, &columns)
        };
        Ok(vec![
            (SUMMARY_GRASP_MEANS, assemble(self.grasp_means)?),
            (SUMMARY_GRASP_STDS, assemble(self.grasp_stds)?),
            (SUMMARY_TIME_MEAN_MEANS, assemble(self.time_mean_means)?),
            (SUMMARY_TIME_STD_MEANS, assemble(self.time_std_means)?),
        ])
    }
}
