use anyhow::Result;
use clap::{Parser, Subcommand};
use graspeval_pipeline::{
    run_analysis, scan_dispositions, AnalysisOptions, AnalysisReport, ScanReport,
    DEFAULT_GROUP_CAP,
};
use serde_json::{json, Value};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "graspeval",
    version = "0.3.0",
    about = "Aggregates per-run training evaluation logs into comparison tables"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline and write detail, summary and audit tables.
    Analyze {
        /// Root folder holding one subfolder per training run.
        root: PathBuf,
        /// Destination folder for the emitted tables.
        #[arg(long)]
        out: PathBuf,
        /// Maximum runs contributing to one parameter group.
        #[arg(long, default_value_t = DEFAULT_GROUP_CAP)]
        cap: usize,
        #[arg(long)]
        json: bool,
    },
    /// Report run dispositions without loading series or writing tables.
    Scan {
        root: PathBuf,
        #[arg(long, default_value_t = DEFAULT_GROUP_CAP)]
        cap: usize,
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let json_mode = command_json_mode(&cli.command);
    match run_command(cli.command) {
        Ok(Some(payload)) => {
            emit_json(&payload);
            Ok(())
        }
        Ok(None) => Ok(()),
        Err(err) => {
            if json_mode {
                emit_json(&json_error("command_failed", err.to_string()));
                std::process::exit(1);
            }
            Err(err)
        }
    }
}

fn run_command(command: Commands) -> Result<Option<Value>> {
    match command {
        Commands::Analyze {
            root,
            out,
            cap,
            json,
        } => {
            let options = AnalysisOptions {
                root,
                out_dir: out,
                group_cap: cap,
            };
            let report = run_analysis(&options)?;
            if json {
                return Ok(Some(json!({
                    "ok": true,
                    "command": "analyze",
                    "out_dir": options.out_dir.display().to_string(),
                    "report": report_to_json(&report)?,
                })));
            }
            print_report(&report);
        }
        Commands::Scan { root, cap, json } => {
            let report = scan_dispositions(&root, cap)?;
            if json {
                return Ok(Some(json!({
                    "ok": true,
                    "command": "scan",
                    "report": serde_json::to_value(&report)?,
                })));
            }
            print_scan(&report);
        }
    }
    Ok(None)
}

fn command_json_mode(command: &Commands) -> bool {
    match command {
        Commands::Analyze { json, .. } | Commands::Scan { json, .. } => *json,
    }
}

fn emit_json(value: &Value) {
    match serde_json::to_string(value) {
        Ok(s) => println!("{}", s),
        Err(_) => println!(
            "{{\"ok\":false,\"error\":{{\"code\":\"serialization_error\",\"message\":\"failed to serialize JSON payload\"}}}}"
        ),
    }
}

fn json_error(code: &str, message: String) -> Value {
    json!({
        "ok": false,
        "error": { "code": code, "message": message }
    })
}

fn report_to_json(report: &AnalysisReport) -> Result<Value> {
    Ok(serde_json::to_value(report)?)
}

fn print_report(report: &AnalysisReport) {
    println!("runs_discovered: {}", report.runs_discovered);
    println!("groups: {}", report.groups);
    println!("runs_used: {}", report.runs_used);
    println!("incomplete: {}", report.incomplete);
    println!("ungrouped: {}", report.ungrouped);
    println!("over_cap: {}", report.over_cap);
    println!("unreadable_series: {}", report.unreadable_series);
    println!("misaligned_series: {}", report.misaligned_series);
    for group in &report.summary_skipped_groups {
        println!("summary_skipped: {}", group);
    }
    println!("tables_written: {}", report.tables_written.len());
    for path in &report.tables_written {
        println!("  {}", path);
    }
}

fn print_scan(report: &ScanReport) {
    for (config_id, runs) in &report.groups {
        println!("group {}: {}", config_id, runs.join(", "));
    }
    for run in &report.incomplete {
        println!("incomplete: {}", run);
    }
    for run in &report.ungrouped {
        println!("ungrouped: {}", run);
    }
    for run in &report.over_cap {
        println!("over_cap: {}", run);
    }
}
