//! Cutting-plane solver - Command Line Interface
//!
//! Lazy connectivity and subtour-elimination cuts over a MILP backend.

use clap::{Parser, Subcommand};
use cutplane::batch::{self, BatchConfig};
use cutplane::controller::{CutLoop, LoopConfig, RunReport};
use cutplane::formulation::{self, FormulationKind};
use cutplane::instance::{SteinerInstance, VrpInstance};
use cutplane::oracle::{GurobiOracle, OracleConfig};
use cutplane::separation::DEFAULT_TOLERANCE;
use cutplane::solution;
use cutplane::visualization::Visualizer;

use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "cutplane")]
#[command(version = "1.0")]
#[command(about = "Cutting-plane solver for Steiner-tree and vehicle-routing MILPs")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Solve one instance with the cutting-plane loop
    Solve {
        /// Path to the instance file
        #[arg(short, long)]
        instance: PathBuf,

        /// Formulation to run
        #[arg(short, long, value_enum)]
        formulation: FormulationKind,

        /// Global time budget in seconds
        #[arg(short, long, default_value = "1800")]
        time_limit: f64,

        /// Selection tolerance for the separators
        #[arg(long, default_value = "0.0001")]
        tolerance: f64,

        /// Write the run report and solution as JSON
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Render the solution as SVG
        #[arg(long)]
        plot: Option<PathBuf>,

        /// Verbose solver output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Run every instance of a directory and export a CSV table
    Batch {
        /// Directory containing instance files
        #[arg(short, long)]
        dir: PathBuf,

        /// Formulation to run
        #[arg(short, long, value_enum)]
        formulation: FormulationKind,

        /// Output CSV file
        #[arg(short, long, default_value = "results.csv")]
        output: PathBuf,

        /// Global time budget per instance, seconds
        #[arg(short, long, default_value = "1800")]
        time_limit: f64,
    },

    /// Generate random routing instances
    Generate {
        /// Output directory
        #[arg(short, long)]
        dir: PathBuf,

        /// Number of instances
        #[arg(short, long, default_value = "10")]
        count: usize,

        /// Visit points per instance (depot included)
        #[arg(short, long, default_value = "10")]
        points: usize,

        /// Vehicles per instance
        #[arg(long, default_value = "2")]
        vehicles: usize,

        /// Base random seed
        #[arg(short, long, default_value = "42")]
        seed: u64,
    },

    /// Print instance statistics and base model dimensions
    Analyze {
        /// Path to the instance file
        #[arg(short, long)]
        instance: PathBuf,

        /// Formulation to analyze
        #[arg(short, long, value_enum)]
        formulation: FormulationKind,
    },
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Solve { instance, formulation, time_limit, tolerance, output, plot, verbose } => {
            solve(&instance, formulation, time_limit, tolerance, output, plot, verbose);
        }

        Commands::Batch { dir, formulation, output, time_limit } => {
            run_batch(&dir, formulation, &output, time_limit);
        }

        Commands::Generate { dir, count, points, vehicles, seed } => {
            generate(&dir, count, points, vehicles, seed);
        }

        Commands::Analyze { instance, formulation } => {
            analyze(&instance, formulation);
        }
    }
}

fn make_oracle(verbose: bool) -> GurobiOracle {
    let config = OracleConfig { verbose, ..OracleConfig::default() };
    match GurobiOracle::new(config) {
        Ok(oracle) => oracle,
        Err(e) => {
            eprintln!("Error creating solver backend: {}", e);
            std::process::exit(1);
        }
    }
}

fn solve(
    path: &Path,
    kind: FormulationKind,
    time_limit: f64,
    tolerance: f64,
    output: Option<PathBuf>,
    plot: Option<PathBuf>,
    verbose: bool,
) {
    println!("Loading instance from {:?}...", path);
    let config = LoopConfig { time_limit, tolerance };
    let oracle = make_oracle(verbose);

    match kind {
        FormulationKind::SteinerCuts => {
            let instance = load_or_exit(SteinerInstance::from_file(path));
            if verbose {
                println!("{}", instance);
            }
            let (model, vars) = formulation::steiner::build_model(&instance);
            let separator = formulation::steiner::separator(&instance, &vars, tolerance);
            let report = run_or_exit(CutLoop::new(oracle, separator, config).run(model));
            println!("{}", report);

            if let Some(assignment) = &report.assignment {
                let tree = solution::extract_steiner_tree(&instance, &vars, assignment, tolerance);
                println!("{}", tree);
                if let Some(plot_path) = &plot {
                    let viz = Visualizer::new();
                    let svg = viz.generate_steiner_svg(&instance, &tree);
                    if let Err(e) = viz.save_svg(&svg, plot_path) {
                        eprintln!("Error writing plot: {}", e);
                    }
                }
                if let Some(out) = &output {
                    write_json(out, &report, serde_json::to_value(&tree).ok());
                }
            } else if let Some(out) = &output {
                write_json(out, &report, None);
            }
        }

        FormulationKind::VrpCuts => {
            let instance = load_or_exit(VrpInstance::from_file(path));
            if verbose {
                println!("{}", instance);
            }
            let (model, vars) = formulation::vrp::build_model(&instance);
            let separator = formulation::vrp::separator(&instance, &vars, tolerance);
            let report = run_or_exit(CutLoop::new(oracle, separator, config).run(model));
            println!("{}", report);

            if let Some(assignment) = &report.assignment {
                let plan = solution::extract_route_plan(&instance, &vars, assignment, tolerance);
                println!("{}", plan);
                if let Some(plot_path) = &plot {
                    let viz = Visualizer::new();
                    let svg = viz.generate_routes_svg(&instance, &plan);
                    if let Err(e) = viz.save_svg(&svg, plot_path) {
                        eprintln!("Error writing plot: {}", e);
                    }
                }
                if let Some(out) = &output {
                    write_json(out, &report, serde_json::to_value(&plan).ok());
                }
            } else if let Some(out) = &output {
                write_json(out, &report, None);
            }
        }
    }
}

fn run_batch(dir: &Path, kind: FormulationKind, output: &Path, time_limit: f64) {
    let paths = load_or_exit(batch::list_instances(dir));
    println!("Running {} instances ({})...", paths.len(), kind.as_str());

    let config = BatchConfig { formulation: kind, time_limit, tolerance: DEFAULT_TOLERANCE };
    let records = batch::run_batch(&paths, &config, || GurobiOracle::new(OracleConfig::default()));

    if let Err(e) = batch::export_csv(&records, output) {
        eprintln!("Error writing CSV: {}", e);
        std::process::exit(1);
    }
    println!("Results written to {:?}", output);
    println!("{}", batch::summarize(&records));
}

fn generate(dir: &Path, count: usize, points: usize, vehicles: usize, seed: u64) {
    if let Err(e) = std::fs::create_dir_all(dir) {
        eprintln!("Error creating directory: {}", e);
        std::process::exit(1);
    }
    for i in 0..count {
        let name = format!("vrp_{}_{}_{}", points, vehicles, i);
        let instance = VrpInstance::generate(name.clone(), points, vehicles, seed + i as u64);
        let path = dir.join(format!("{}.txt", name));
        if let Err(e) = instance.write_to(&path) {
            eprintln!("Error writing {:?}: {}", path, e);
            std::process::exit(1);
        }
        println!("Wrote {:?}", path);
    }
}

fn analyze(path: &Path, kind: FormulationKind) {
    match kind {
        FormulationKind::SteinerCuts => {
            let instance = load_or_exit(SteinerInstance::from_file(path));
            println!("{}", instance);
            let (model, vars) = formulation::steiner::build_model(&instance);
            println!("  Arc variables: {}", vars.arcs.len());
            println!("  Base constraints: {}", model.base_constraints().len());
        }
        FormulationKind::VrpCuts => {
            let instance = load_or_exit(VrpInstance::from_file(path));
            println!("{}", instance);
            let (model, vars) = formulation::vrp::build_model(&instance);
            println!("  Arc variables: {}", vars.arcs.len());
            println!("  Visit variables: {}", vars.visits.len());
            println!("  Base constraints: {}", model.base_constraints().len());
        }
    }
}

fn load_or_exit<T>(result: cutplane::error::Result<T>) -> T {
    match result {
        Ok(value) => value,
        Err(e) => {
            eprintln!("Error loading instance: {}", e);
            std::process::exit(1);
        }
    }
}

fn run_or_exit(result: cutplane::error::Result<RunReport>) -> RunReport {
    match result {
        Ok(report) => report,
        Err(e) => {
            eprintln!("Error during solve: {}", e);
            std::process::exit(1);
        }
    }
}

fn write_json(path: &Path, report: &RunReport, solution: Option<serde_json::Value>) {
    let value = serde_json::json!({
        "status": report.status.as_str(),
        "objective": report.objective,
        "lower_bound": report.lower_bound,
        "upper_bound": report.upper_bound,
        "relaxation": report.relaxation,
        "gap_percent": report.gap_percent,
        "iterations": report.iterations,
        "cuts_added": report.cuts_added,
        "solver_time": report.solver_time,
        "solution": solution,
    });
    match serde_json::to_string_pretty(&value) {
        Ok(text) => {
            if let Err(e) = std::fs::write(path, text) {
                eprintln!("Error writing output: {}", e);
            }
        }
        Err(e) => eprintln!("Error serializing output: {}", e),
    }
}
