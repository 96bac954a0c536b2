//! Batch orchestration over a directory of instances.
//!
//! Runs every instance file through the cutting-plane loop on the rayon
//! pool, one isolated worker per instance: a panic or error in one run is
//! recorded and never aborts the siblings. Results land in a CSV table
//! plus an aggregate text report.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};

use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info};
use ordered_float::OrderedFloat;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

use crate::controller::{CutLoop, LoopConfig, RunStatus};
use crate::error::{CutplaneError, Result};
use crate::formulation::{self, FormulationKind};
use crate::instance::{SteinerInstance, VrpInstance};
use crate::oracle::SolverOracle;

/// Configuration shared by every run of a batch.
#[derive(Debug, Clone)]
pub struct BatchConfig {
    pub formulation: FormulationKind,
    pub time_limit: f64,
    pub tolerance: f64,
}

impl BatchConfig {
    fn loop_config(&self) -> LoopConfig {
        LoopConfig { time_limit: self.time_limit, tolerance: self.tolerance }
    }
}

/// One CSV row of a batch: either a finished run or a recorded failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub formulation: String,
    pub instance: String,
    pub status: String,
    pub objective: Option<f64>,
    pub lower_bound: Option<f64>,
    pub relaxation: Option<f64>,
    pub gap_percent: Option<f64>,
    pub iterations: usize,
    pub cuts: usize,
    pub solver_time: f64,
    pub error: Option<String>,
}

impl RunRecord {
    fn failed(config: &BatchConfig, instance: &str, message: String) -> Self {
        RunRecord {
            formulation: config.formulation.as_str().to_string(),
            instance: instance.to_string(),
            status: "Error".to_string(),
            objective: None,
            lower_bound: None,
            relaxation: None,
            gap_percent: None,
            iterations: 0,
            cuts: 0,
            solver_time: 0.0,
            error: Some(message),
        }
    }
}

/// Instance files of a directory, sorted by name for stable run order.
pub fn list_instances<P: AsRef<Path>>(dir: P) -> Result<Vec<PathBuf>> {
    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .collect();
    paths.sort();
    if paths.is_empty() {
        return Err(CutplaneError::MalformedInput(
            "no instance files in directory".to_string(),
        ));
    }
    Ok(paths)
}

/// Solve one instance file end to end with a fresh oracle.
pub fn solve_instance<O: SolverOracle>(
    path: &Path,
    config: &BatchConfig,
    oracle: O,
) -> Result<RunRecord> {
    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "instance".to_string());

    let report = match config.formulation {
        FormulationKind::SteinerCuts => {
            let instance = SteinerInstance::from_file(path)?;
            let (model, vars) = formulation::steiner::build_model(&instance);
            let separator = formulation::steiner::separator(&instance, &vars, config.tolerance);
            CutLoop::new(oracle, separator, config.loop_config()).run(model)?
        }
        FormulationKind::VrpCuts => {
            let instance = VrpInstance::from_file(path)?;
            let (model, vars) = formulation::vrp::build_model(&instance);
            let separator = formulation::vrp::separator(&instance, &vars, config.tolerance);
            CutLoop::new(oracle, separator, config.loop_config()).run(model)?
        }
    };

    Ok(RunRecord {
        formulation: config.formulation.as_str().to_string(),
        instance: name,
        status: report.status.as_str().to_string(),
        objective: report.objective,
        lower_bound: report.lower_bound,
        relaxation: report.relaxation,
        gap_percent: report.gap_percent,
        iterations: report.iterations,
        cuts: report.cuts_added,
        solver_time: report.solver_time,
        error: None,
    })
}

/// Run the whole batch in parallel. `make_oracle` builds one fresh oracle
/// per worker so no solver state is shared across instances.
pub fn run_batch<O, F>(paths: &[PathBuf], config: &BatchConfig, make_oracle: F) -> Vec<RunRecord>
where
    O: SolverOracle,
    F: Fn() -> Result<O> + Sync,
{
    let bar = ProgressBar::new(paths.len() as u64);
    bar.set_style(
        ProgressStyle::with_template("[{elapsed_precise}] {bar:40} {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );

    let mut records: Vec<RunRecord> = paths
        .par_iter()
        .map(|path| {
            let name = path
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_else(|| "instance".to_string());
            bar.set_message(name.clone());

            let outcome = catch_unwind(AssertUnwindSafe(|| {
                let oracle = make_oracle()?;
                solve_instance(path, config, oracle)
            }));
            let record = match outcome {
                Ok(Ok(record)) => record,
                Ok(Err(err)) => {
                    error!("{}: {}", name, err);
                    RunRecord::failed(config, &name, err.to_string())
                }
                Err(_) => {
                    error!("{}: worker panicked", name);
                    RunRecord::failed(config, &name, "worker panicked".to_string())
                }
            };
            bar.inc(1);
            record
        })
        .collect();
    bar.finish_and_clear();

    records.sort_by(|a, b| a.instance.cmp(&b.instance));
    info!("batch finished: {} instances", records.len());
    records
}

/// Write the per-instance table as CSV.
pub fn export_csv<P: AsRef<Path>>(records: &[RunRecord], path: P) -> Result<()> {
    let mut writer = csv::Writer::from_path(path).map_err(|e| CutplaneError::Export(e.to_string()))?;
    for record in records {
        writer
            .serialize(record)
            .map_err(|e| CutplaneError::Export(e.to_string()))?;
    }
    writer.flush()?;
    Ok(())
}

/// Aggregate view of a finished batch.
#[derive(Debug, Clone)]
pub struct BatchSummary {
    pub total: usize,
    pub converged: usize,
    pub time_exceeded: usize,
    pub infeasible: usize,
    pub errors: usize,
    pub mean_solver_time: f64,
    pub std_solver_time: f64,
    pub best_objective: Option<f64>,
    pub mean_gap_percent: Option<f64>,
}

pub fn summarize(records: &[RunRecord]) -> BatchSummary {
    let count_status =
        |s: RunStatus| records.iter().filter(|r| r.status == s.as_str()).count();

    let times: Vec<f64> = records.iter().map(|r| r.solver_time).collect();
    let (mean_solver_time, std_solver_time) = if times.is_empty() {
        (0.0, 0.0)
    } else {
        ((&times).mean(), (&times).std_dev())
    };

    let best_objective = records
        .iter()
        .filter_map(|r| r.objective)
        .map(OrderedFloat)
        .min()
        .map(|v| v.into_inner());

    let gaps: Vec<f64> = records.iter().filter_map(|r| r.gap_percent).collect();
    let mean_gap_percent = if gaps.is_empty() { None } else { Some((&gaps).mean()) };

    BatchSummary {
        total: records.len(),
        converged: count_status(RunStatus::Converged),
        time_exceeded: count_status(RunStatus::TimeExceeded),
        infeasible: count_status(RunStatus::Infeasible),
        errors: records.iter().filter(|r| r.error.is_some()).count(),
        mean_solver_time,
        std_solver_time,
        best_objective,
        mean_gap_percent,
    }
}

impl std::fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Generated: {}", chrono::Local::now().format("%Y-%m-%d %H:%M:%S"))?;
        writeln!(f, "Instances: {}", self.total)?;
        writeln!(
            f,
            "Converged: {} | TimeExceeded: {} | Infeasible: {} | Errors: {}",
            self.converged, self.time_exceeded, self.infeasible, self.errors
        )?;
        writeln!(
            f,
            "Solver time: mean {:.2}s, std {:.2}s",
            self.mean_solver_time, self.std_solver_time
        )?;
        if let Some(best) = self.best_objective {
            writeln!(f, "Best objective: {:.2}", best)?;
        }
        if let Some(gap) = self.mean_gap_percent {
            writeln!(f, "Mean gap: {:.4}%", gap)?;
        }
        Ok(())
    }
}
