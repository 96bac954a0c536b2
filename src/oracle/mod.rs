//! Solver oracle abstraction.
//!
//! The MILP solver is an opaque, possibly non-deterministic external
//! search. It is isolated behind the narrow [`SolverOracle`] trait so the
//! separation and control logic never touch the concrete backend. The
//! only guaranteed contract: the oracle can be called repeatedly on an
//! incrementally larger model and always resolves the full accumulated
//! constraint set.

use crate::error::Result;
use crate::model::{Assignment, Model};

// When built with the `gurobi` feature, expose the real implementation
#[cfg(feature = "gurobi")]
mod gurobi;
#[cfg(feature = "gurobi")]
pub use gurobi::GurobiOracle;

/// Outcome status of a single oracle call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveStatus {
    /// Proven optimal for the current model.
    Optimal,
    /// The per-call time slice ran out; the outcome may still carry the
    /// best incumbent found.
    TimeLimit,
    /// No feasible integer solution under the current cut set.
    Infeasible,
}

/// Result of one oracle call on the current model.
#[derive(Debug, Clone)]
pub struct SolveOutcome {
    pub status: SolveStatus,
    /// Objective of the returned assignment, when one exists.
    pub objective: Option<f64>,
    /// Best proven bound (lower bound for minimization).
    pub lower_bound: Option<f64>,
    /// Best incumbent objective known to the solver.
    pub upper_bound: Option<f64>,
    /// Variable values of the returned assignment.
    pub assignment: Option<Assignment>,
    /// Wall-clock seconds this call consumed.
    pub elapsed: f64,
}

impl SolveOutcome {
    /// Outcome for an infeasible model.
    pub fn infeasible(elapsed: f64) -> Self {
        SolveOutcome {
            status: SolveStatus::Infeasible,
            objective: None,
            lower_bound: None,
            upper_bound: None,
            assignment: None,
            elapsed,
        }
    }
}

/// An external solver behind a narrow solve interface.
///
/// `&mut self` because backends keep environments and licenses alive
/// across calls.
pub trait SolverOracle {
    /// Solve the model within `time_limit` seconds. Blocking; the
    /// controller never inspects the internal search.
    fn solve(&mut self, model: &Model, time_limit: f64) -> Result<SolveOutcome>;
}

/// Backend configuration shared by oracle implementations.
#[derive(Debug, Clone)]
pub struct OracleConfig {
    /// MIP gap tolerance
    pub mip_gap: f64,
    /// Number of threads (0 = automatic)
    pub threads: i32,
    /// Enable verbose solver output
    pub verbose: bool,
}

impl Default for OracleConfig {
    fn default() -> Self {
        OracleConfig { mip_gap: 1e-6, threads: 0, verbose: false }
    }
}

// Without the feature, provide a stub so the CLI compiles; it reports the
// missing backend at run time (never silently "solves").
#[cfg(not(feature = "gurobi"))]
mod gurobi_stub {
    use super::{OracleConfig, SolveOutcome, SolverOracle};
    use crate::error::{CutplaneError, Result};
    use crate::model::Model;

    pub struct GurobiOracle {
        #[allow(dead_code)]
        config: OracleConfig,
    }

    impl GurobiOracle {
        pub fn new(config: OracleConfig) -> Result<Self> {
            Ok(GurobiOracle { config })
        }
    }

    impl SolverOracle for GurobiOracle {
        fn solve(&mut self, _model: &Model, _time_limit: f64) -> Result<SolveOutcome> {
            Err(CutplaneError::SolverUnavailable(
                "this binary was built without the `gurobi` feature".to_string(),
            ))
        }
    }
}

#[cfg(not(feature = "gurobi"))]
pub use gurobi_stub::GurobiOracle;
