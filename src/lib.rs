//! Cutting-plane solver library
//!
//! A lazy-constraint engine for MILP formulations whose structural
//! constraint families are exponential: connectivity cuts for rooted
//! Steiner trees and subtour-elimination cuts for multi-vehicle routing.
//!
//! # Features
//!
//! - Backend-neutral MILP model with an append-only cut pool
//! - Iteration controller: solve, separate, inject until convergence
//! - BFS connectivity separation and per-vehicle SCC subtour separation
//! - Gurobi backend behind the `gurobi` feature
//! - Instance parsing, random instance generation, batch runs, SVG plots
//!
//! # Example
//!
//! ```no_run
//! use cutplane::controller::{CutLoop, LoopConfig};
//! use cutplane::formulation::steiner;
//! use cutplane::instance::SteinerInstance;
//! use cutplane::oracle::{GurobiOracle, OracleConfig};
//! use cutplane::separation::DEFAULT_TOLERANCE;
//!
//! let instance = SteinerInstance::from_file("instance.txt").unwrap();
//! let (model, vars) = steiner::build_model(&instance);
//! let separator = steiner::separator(&instance, &vars, DEFAULT_TOLERANCE);
//! let oracle = GurobiOracle::new(OracleConfig::default()).unwrap();
//!
//! let mut cut_loop = CutLoop::new(oracle, separator, LoopConfig::default());
//! let report = cut_loop.run(model).unwrap();
//! println!("{}", report);
//! ```

pub mod batch;
pub mod controller;
pub mod cuts;
pub mod error;
pub mod formulation;
pub mod instance;
pub mod model;
pub mod oracle;
pub mod separation;
pub mod solution;
pub mod visualization;

pub use controller::{CutLoop, LoopConfig, RunReport, RunStatus};
pub use error::{CutplaneError, Result};
pub use model::{Assignment, Model};
