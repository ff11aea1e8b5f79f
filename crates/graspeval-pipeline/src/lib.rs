//! Aggregation pipeline for training-run evaluation logs.
//!
//! Stages run strictly in order: discover run folders, group them by
//! the parameter specification that produced them, load each member's
//! per-update metric series, aggregate per group, then emit the
//! per-group detail tables, the four cross-group summaries, and the
//! audit pair describing what was used and what was not.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{info, warn};

pub mod aggregate;
pub mod audit;
pub mod discover;
pub mod group;
pub mod metadata;
pub mod series;

use aggregate::{aggregate_group, validate_alignment, GroupMember, SummaryAccumulator};
use audit::{write_audit, Dispositions};
use discover::scan_runs;
use graspeval_core::{sanitize_config_id, write_table};
use group::group_runs;
use series::load_series;

pub use group::DEFAULT_GROUP_CAP;

pub const GRASPS_DIR: &str = "Grasps";
pub const MEAN_TIMES_DIR: &str = "MeansOfGraspMeanTimes";
pub const STD_TIMES_DIR: &str = "MeansOfGraspTimeStds";
pub const SUMMARY_DIR: &str = "Summary";
pub const EVALUATED_DATA_DIR: &str = "EvaluatedData";

#[derive(Debug, Clone)]
pub struct AnalysisOptions {
    /// Root folder holding one subfolder per training run.
    pub root: PathBuf,
    /// Destination folder for all emitted tables.
    pub out_dir: PathBuf,
    /// Maximum runs contributing to one parameter group.
    pub group_cap: usize,
}

/// What one pipeline execution did, for the CLI report.
#[derive(Debug, Default, Serialize)]
pub struct AnalysisReport {
    pub runs_discovered: usize,
    pub groups: usize,
    pub runs_used: usize,
    pub incomplete: usize,
    pub ungrouped: usize,
    pub over_cap: usize,
    pub unreadable_series: usize,
    pub misaligned_series: usize,
    /// Groups whose update column did not match the shared summary
    /// column; their detail tables exist but no summary column does.
    pub summary_skipped_groups: Vec<String>,
    pub tables_written: Vec<String>,
}

/// Runs the whole pipeline. Per-run defects fold into the audit
/// output; only an unreadable root or a failed table write is fatal.
pub fn run_analysis(options: &AnalysisOptions) -> Result<AnalysisReport> {
    let scan = scan_runs(&options.root)?;
    info!(
        discovered = scan.discovered(),
        complete = scan.complete.len(),
        incomplete = scan.incomplete.len(),
        "run scan finished"
    );
    let grouping = group_runs(&scan.complete, options.group_cap);

    let mut dispositions = Dispositions {
        incomplete: scan.incomplete,
        ungrouped: grouping.ungrouped,
        over_cap: grouping.over_cap,
        ..Dispositions::default()
    };
    let mut report = AnalysisReport {
        runs_discovered: scan.complete.len()
            + dispositions.incomplete.len(),
        ..AnalysisReport::default()
    };

    let mut accumulator = SummaryAccumulator::new();
    for (config_id, members) in &grouping.groups {
        let mut loaded = Vec::with_capacity(members.len());
        for run in members {
            match load_series(&run.path) {
                Ok(series) => loaded.push(GroupMember {
                    run: run.clone(),
                    series,
                }),
                Err(err) => {
                    warn!(run = %run.name, %err, "metric series unusable, excluding run");
                    dispositions.unreadable_series.push(run.name.clone());
                }
            }
        }
        let aligned = validate_alignment(loaded);
        dispositions
            .misaligned_series
            .extend(aligned.rejected.iter().cloned());
        if aligned.members.is_empty() {
            warn!(config = %config_id, "no usable runs left in group, skipping");
            continue;
        }

        let agg = aggregate_group(&aligned.members)
            .with_context(|| format!("aggregating group {}", config_id))?;
        // Sanitize before appending the table suffix; sanitizing the
        // composed name would leave the .json suffix stranded mid-string.
        let sanitized = sanitize_config_id(config_id);
        let tables = [
            (GRASPS_DIR, format!("{}_mean_std", sanitized), &agg.grasps),
            (MEAN_TIMES_DIR, format!("{}_mean", sanitized), &agg.mean_times),
            (STD_TIMES_DIR, format!("{}_mean", sanitized), &agg.std_times),
        ];
        for (area, base_name, table) in tables {
            let path = write_table(&options.out_dir.join(area), &base_name, table)
                .with_context(|| format!("writing {} table for {}", area, config_id))?;
            report.tables_written.push(path.display().to_string());
        }

        if !accumulator.fold(&sanitized, &agg.derived) {
            warn!(
                config = %config_id,
                "group update column differs from summary column, skipping in summaries"
            );
            report.summary_skipped_groups.push(sanitized);
        }
        dispositions.used.insert(
            config_id.clone(),
            aligned.members.iter().map(|m| m.run.name.clone()).collect(),
        );
    }

    for (name, table) in accumulator.into_summary_tables()? {
        let path = write_table(&options.out_dir.join(SUMMARY_DIR), name, &table)
            .with_context(|| format!("writing summary table {}", name))?;
        report.tables_written.push(path.display().to_string());
    }

    write_audit(&options.out_dir.join(EVALUATED_DATA_DIR), &dispositions)?;

    report.groups = dispositions.used.len();
    report.runs_used = dispositions.used_run_count();
    report.incomplete = dispositions.incomplete.len();
    report.ungrouped = dispositions.ungrouped.len();
    report.over_cap = dispositions.over_cap.len();
    report.unreadable_series = dispositions.unreadable_series.len();
    report.misaligned_series = dispositions.misaligned_series.len();
    info!(
        groups = report.groups,
        runs_used = report.runs_used,
        tables = report.tables_written.len(),
        "analysis finished"
    );
    Ok(report)
}

/// Disposition preview without loading metric series or writing
/// anything: discovery and grouping only.
#[derive(Debug, Serialize)]
pub struct ScanReport {
    pub groups: BTreeMap<String, Vec<String>>,
    pub incomplete: Vec<String>,
    pub ungrouped: Vec<String>,
    pub over_cap: Vec<String>,
}

pub fn scan_dispositions(root: &Path, group_cap: usize) -> Result<ScanReport> {
    let scan = scan_runs(root)?;
    let grouping = group_runs(&scan.complete, group_cap);
    Ok(ScanReport {
        groups: grouping
            .groups
            .into_iter()
            .map(|(id, members)| (id, members.into_iter().map(|r| r.name).collect()))
            .collect(),
        incomplete: scan.incomplete,
        ungrouped: grouping.ungrouped,
        over_cap: grouping.over_cap,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discover::FINAL_MODEL_MARKER;
    use crate::metadata::PARAMS_FILE;
    use crate::series::TRAINING_EVAL_FILE;
    use graspeval_core::{ensure_dir, read_table};
    use serde_json::json;
    use std::fs;

    const EPS: f64 = 1e-12;

    struct Fixture {
        root: PathBuf,
        runs: PathBuf,
        out: PathBuf,
    }

    impl Fixture {
        fn new(tag: &str) -> Self {
            let root = std::env::temp_dir().join(format!(
                "graspeval_pipeline_{}_{}_{}",
                tag,
                std::process::id(),
                chrono::Utc::now().timestamp_micros()
            ));
            let runs = root.join("Results");
            let out = root.join("TrainingProgressEvaluation");
            ensure_dir(&runs).expect("runs dir");
            Self { root, runs, out }
        }

        fn options(&self) -> AnalysisOptions {
            AnalysisOptions {
                root: self.runs.clone(),
                out_dir: self.out.clone(),
                group_cap: DEFAULT_GROUP_CAP,
            }
        }

        fn add_run(&self, name: &str, config_id: Option<&str>, complete: bool) -> PathBuf {
            let dir = self.runs.join(name);
            ensure_dir(&dir).expect("run dir");
            if complete {
                fs::write(dir.join(FINAL_MODEL_MARKER), b"model").expect("marker");
            }
            if let Some(id) = config_id {
                let params = json!({ "provided_params_file": id });
                fs::write(dir.join(PARAMS_FILE), params.to_string()).expect("params");
            }
            dir
        }

        fn add_series(&self, run: &Path, rows: &[[f64; 4]]) {
            let mut text = String::from("\"Updates\",\"Grasps\",\"MeanTime\",\"StdTime\"\n");
            for row in rows {
                let cells: Vec<String> =
                    row.iter().map(|v| format!("\"{}\"", v)).collect();
                text.push_str(&cells.join(","));
                text.push('\n');
            }
            fs::write(run.join(TRAINING_EVAL_FILE), text).expect("series");
        }

        fn default_rows(&self) -> Vec<[f64; 4]> {
            vec![
                [10.0, 1.0, 40.0, 2.0],
                [20.0, 2.0, 38.0, 2.5],
                [30.0, 3.0, 35.0, 1.0],
                [40.0, 4.0, 33.0, 0.5],
            ]
        }
    }

    impl Drop for Fixture {
        fn drop(&mut self) {
            let _ = fs::remove_dir_all(&self.root);
        }
    }

    #[test]
    fn scenario_a_two_runs_one_group_no_discards() {
        let fx = Fixture::new("scenario_a");
        for name in ["run_1", "run_2"] {
            let dir = fx.add_run(name, Some("cfgA"), true);
            fx.add_series(&dir, &fx.default_rows());
        }
        let report = run_analysis(&fx.options()).expect("analysis");
        assert_eq!(report.groups, 1);
        assert_eq!(report.runs_used, 2);
        assert_eq!(report.incomplete, 0);
        assert_eq!(report.over_cap, 0);
        assert_eq!(report.ungrouped, 0);
    }

    #[test]
    fn scenario_b_sixth_run_is_discarded_over_cap() {
        let fx = Fixture::new("scenario_b");
        for i in 1..=6 {
            let dir = fx.add_run(&format!("run_{}", i), Some("cfgA"), true);
            fx.add_series(&dir, &fx.default_rows());
        }
        let report = run_analysis(&fx.options()).expect("analysis");
        assert_eq!(report.runs_used, 5);
        assert_eq!(report.over_cap, 1);
        let not_used =
            fs::read_to_string(fx.out.join(EVALUATED_DATA_DIR).join(audit::NOT_USED_DATA_FILE))
                .expect("audit");
        assert!(not_used.contains("\"run_6\""));
    }

    #[test]
    fn scenario_c_incomplete_run_never_grouped() {
        let fx = Fixture::new("scenario_c");
        let dir = fx.add_run("run_1", Some("cfgA"), true);
        fx.add_series(&dir, &fx.default_rows());
        fx.add_run("run_2", Some("cfgA"), false);
        let report = run_analysis(&fx.options()).expect("analysis");
        assert_eq!(report.incomplete, 1);
        assert_eq!(report.runs_used, 1);
        let used =
            fs::read_to_string(fx.out.join(EVALUATED_DATA_DIR).join(audit::USED_DATA_FILE))
                .expect("audit");
        assert!(!used.contains("run_2"));
    }

    #[test]
    fn scenario_d_missing_params_key_is_ungrouped() {
        let fx = Fixture::new("scenario_d");
        let dir = fx.add_run("run_1", Some("cfgA"), true);
        fx.add_series(&dir, &fx.default_rows());
        let odd = fx.add_run("run_2", None, true);
        fs::write(odd.join(PARAMS_FILE), b"{\"other_key\": true}").expect("params");
        let report = run_analysis(&fx.options()).expect("analysis");
        assert_eq!(report.ungrouped, 1);
        assert_eq!(report.runs_used, 1);
    }

    #[test]
    fn scenario_e_row_wise_mean_and_population_std() {
        let fx = Fixture::new("scenario_e");
        let grasp_cols = [
            [1.0, 2.0, 3.0, 4.0],
            [3.0, 2.0, 1.0, 0.0],
            [2.0, 2.0, 2.0, 2.0],
        ];
        for (i, grasps) in grasp_cols.iter().enumerate() {
            let dir = fx.add_run(&format!("run_{}", i + 1), Some("cfgA"), true);
            let rows: Vec<[f64; 4]> = (0..4)
                .map(|r| [10.0 * (r as f64 + 1.0), grasps[r], 40.0, 1.0])
                .collect();
            fx.add_series(&dir, &rows);
        }
        run_analysis(&fx.options()).expect("analysis");

        let grasps = read_table(&fx.out.join(GRASPS_DIR).join("cfgA_mean_std.csv")).expect("table");
        assert_eq!(
            grasps.header,
            vec![
                "run_1",
                "run_2",
                "run_3",
                aggregate::MEAN_OVER_GRASPS,
                aggregate::STD_OVER_GRASPS
            ]
        );
        assert_eq!(grasps.rows.len(), 4);
        for row in &grasps.rows {
            let mean = row[3];
            assert!((mean - 2.0).abs() < EPS);
        }
        // Row 0: grasp values 1, 3, 2 -> population std sqrt(2/3).
        assert!((grasps.rows[0][4] - (2.0f64 / 3.0).sqrt()).abs() < EPS);
        // Row 1: values 2, 2, 2 -> std 0.
        assert!(grasps.rows[1][4].abs() < EPS);

        let summary =
            read_table(&fx.out.join(SUMMARY_DIR).join("MeansOverGrasps.csv")).expect("summary");
        assert_eq!(summary.header, vec!["Updates", "cfgA"]);
        assert_eq!(summary.rows[0][0], 10.0);
        assert!((summary.rows[0][1] - 2.0).abs() < EPS);
    }

    #[test]
    fn detail_table_names_use_sanitized_identifier() {
        let fx = Fixture::new("sanitized_names");
        for name in ["run_1", "run_2"] {
            let dir = fx.add_run(name, Some("ParameterSettings/cfgA.json"), true);
            fx.add_series(&dir, &fx.default_rows());
        }
        run_analysis(&fx.options()).expect("analysis");
        assert!(fx.out.join(GRASPS_DIR).join("cfgA_mean_std.csv").is_file());
        assert!(fx.out.join(MEAN_TIMES_DIR).join("cfgA_mean.csv").is_file());
        assert!(fx.out.join(STD_TIMES_DIR).join("cfgA_mean.csv").is_file());
        // File name and summary column share the sanitized key.
        let summary =
            read_table(&fx.out.join(SUMMARY_DIR).join("MeansOverGrasps.csv")).expect("summary");
        assert_eq!(summary.header, vec!["Updates", "cfgA"]);
    }

    #[test]
    fn unreadable_series_is_excluded_and_group_continues() {
        let fx = Fixture::new("unreadable");
        let ok = fx.add_run("run_1", Some("cfgA"), true);
        fx.add_series(&ok, &fx.default_rows());
        // run_2 is complete and grouped but has no training_eval.csv.
        fx.add_run("run_2", Some("cfgA"), true);
        let report = run_analysis(&fx.options()).expect("analysis");
        assert_eq!(report.unreadable_series, 1);
        assert_eq!(report.runs_used, 1);
        let grasps = read_table(&fx.out.join(GRASPS_DIR).join("cfgA_mean_std.csv")).expect("table");
        assert_eq!(grasps.header.len(), 3);
        assert!(!grasps.header.contains(&"run_2".to_string()));
    }

    #[test]
    fn misaligned_member_is_excluded_and_audited() {
        let fx = Fixture::new("misaligned");
        let a = fx.add_run("run_1", Some("cfgA"), true);
        fx.add_series(&a, &fx.default_rows());
        let b = fx.add_run("run_2", Some("cfgA"), true);
        fx.add_series(&b, &[[10.0, 1.0, 40.0, 2.0], [25.0, 2.0, 38.0, 2.5]]);
        let report = run_analysis(&fx.options()).expect("analysis");
        assert_eq!(report.misaligned_series, 1);
        assert_eq!(report.runs_used, 1);
        let not_used =
            fs::read_to_string(fx.out.join(EVALUATED_DATA_DIR).join(audit::NOT_USED_DATA_FILE))
                .expect("audit");
        assert!(not_used.contains("\"run_2\""));
    }

    #[test]
    fn group_with_no_usable_runs_still_writes_summaries() {
        let fx = Fixture::new("empty_group");
        fx.add_run("run_1", Some("cfgA"), true);
        let report = run_analysis(&fx.options()).expect("analysis");
        assert_eq!(report.groups, 0);
        let summary =
            read_table(&fx.out.join(SUMMARY_DIR).join("StdOverGrasps.csv")).expect("summary");
        assert_eq!(summary.header, vec!["Updates"]);
        assert!(summary.rows.is_empty());
    }

    #[test]
    fn four_summaries_carry_distinct_matrices() {
        let fx = Fixture::new("summaries");
        let dir = fx.add_run("run_1", Some("cfgA"), true);
        fx.add_series(
            &dir,
            &[[10.0, 1.0, 40.0, 2.0], [20.0, 3.0, 30.0, 4.0]],
        );
        run_analysis(&fx.options()).expect("analysis");
        let summary_dir = fx.out.join(SUMMARY_DIR);
        let means = read_table(&summary_dir.join("MeanOverMeanGraspingTimes.csv")).expect("t");
        let stds = read_table(&summary_dir.join("MeanOverStdOfGraspingTimes.csv")).expect("t");
        assert_eq!(means.rows[0][1], 40.0);
        assert_eq!(stds.rows[0][1], 2.0);
        assert_eq!(stds.rows[1][1], 4.0);
    }

    #[test]
    fn rerun_on_unchanged_input_is_byte_identical() {
        let fx = Fixture::new("idempotent");
        for (i, id) in [(1, "cfgA"), (2, "cfgA"), (3, "cfgB")] {
            let dir = fx.add_run(&format!("run_{}", i), Some(id), true);
            fx.add_series(&dir, &fx.default_rows());
        }
        fx.add_run("run_4", Some("cfgB"), false);

        run_analysis(&fx.options()).expect("first run");
        let snapshot = |out: &Path| -> BTreeMap<PathBuf, Vec<u8>> {
            walkdir::WalkDir::new(out)
                .sort_by_file_name()
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file())
                .map(|e| (e.path().to_path_buf(), fs::read(e.path()).expect("bytes")))
                .collect()
        };
        let first = snapshot(&fx.out);
        assert!(!first.is_empty());
        run_analysis(&fx.options()).expect("second run");
        let second = snapshot(&fx.out);
        assert_eq!(first, second);
    }

    #[test]
    fn scan_dispositions_reports_without_writing() {
        let fx = Fixture::new("scan");
        fx.add_run("run_1", Some("cfgA"), true);
        fx.add_run("run_2", None, true);
        fx.add_run("run_3", Some("cfgA"), false);
        let report = scan_dispositions(&fx.runs, DEFAULT_GROUP_CAP).expect("scan");
        assert_eq!(report.groups["cfgA"], vec!["run_1"]);
        assert_eq!(report.ungrouped, vec!["run_2"]);
        assert_eq!(report.incomplete, vec!["run_3"]);
        assert!(!fx.out.exists());
    }
}
