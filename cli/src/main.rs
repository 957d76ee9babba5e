//! `landtrack` CLI: run simulated landing approaches against the
//! estimator and report the outcome as JSON.

use anyhow::Result;
use clap::{Parser, Subcommand};
use estimator_core::output::{Diagnostics, TargetPose};
use serde::Serialize;
use sim::{LandingSim, Scenario, ScenarioKind};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "landtrack", about = "Landing-target estimator scenario runner")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a named scenario in batch mode and print a JSON report.
    RunScenario {
        #[arg(value_enum)]
        scenario: ScenarioKind,
        /// Random seed for reproducibility
        #[arg(long, default_value_t = 42)]
        seed: u64,
        /// Also write the report to a JSON file
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

#[derive(Serialize)]
struct RunSummary {
    scenario: String,
    seed: u64,
    poses_published: usize,
    innovation_records: usize,
    final_pose: Option<TargetPose>,
    truth_rel_pos: [f64; 3],
    truth_rel_vel: [f64; 3],
    /// Euclidean error of the final estimate against truth (m).
    pos_error_m: Option<f64>,
    diagnostics: Diagnostics,
    initialized_at_end: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::RunScenario {
            scenario,
            seed,
            output,
        } => run_scenario(scenario, seed, output.as_deref()),
    }
}

fn run_scenario(kind: ScenarioKind, seed: u64, output: Option<&Path>) -> Result<()> {
    let scenario = Scenario::build(kind, seed);
    let report = LandingSim::new(scenario).run();

    let pos_error_m = report.final_pose().map(|pose| {
        let e: f64 = (0..3)
            .map(|i| (pose.rel_pos[i] - report.truth_rel_pos[i]).powi(2))
            .sum();
        e.sqrt()
    });
    let summary = RunSummary {
        scenario: report.name.clone(),
        seed,
        poses_published: report.poses.len(),
        innovation_records: report.innovations.len(),
        final_pose: report.final_pose().copied(),
        truth_rel_pos: report.truth_rel_pos,
        truth_rel_vel: report.truth_rel_vel,
        pos_error_m,
        diagnostics: report.diagnostics,
        initialized_at_end: report.initialized_at_end,
    };

    let json = serde_json::to_string_pretty(&summary)?;
    println!("{json}");
    if let Some(path) = output {
        std::fs::write(path, &json)?;
    }
    Ok(())
}
