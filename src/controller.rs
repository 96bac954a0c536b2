//! Iteration controller for the cutting-plane loop.
//!
//! Drives solve -> separate -> inject until convergence, infeasibility, or
//! exhaustion of the global time budget. The controller exclusively owns
//! the model; cut injection mutates this owned value between solves, never
//! hidden global state.
//!
//! Termination: each accepted cut excludes the exact component/SCC
//! structure just discovered, and there are finitely many such structures
//! over a finite vertex set, so the loop converges without the budget.
//! The budget is a practical backstop on larger instances.

use log::{debug, info, warn};

use crate::error::Result;
use crate::model::{Assignment, Model};
use crate::oracle::{SolveStatus, SolverOracle};
use crate::separation::{Separator, DEFAULT_TOLERANCE};

/// Configuration of one cutting-plane run.
#[derive(Debug, Clone)]
pub struct LoopConfig {
    /// Global wall-clock budget in seconds for all solver calls combined.
    pub time_limit: f64,
    /// Selection tolerance shared with the separators.
    pub tolerance: f64,
}

impl Default for LoopConfig {
    fn default() -> Self {
        // 1800 s is the classical half-hour budget of the reference runs.
        LoopConfig { time_limit: 1800.0, tolerance: DEFAULT_TOLERANCE }
    }
}

/// Terminal state of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// The separator found no violation: the assignment is structurally
    /// feasible and accepted as final.
    Converged,
    /// The global budget ran out; the best incumbent is reported and may
    /// still violate structural constraints.
    TimeExceeded,
    /// No feasible integer solution under the current cut set.
    Infeasible,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Converged => "Converged",
            RunStatus::TimeExceeded => "TimeExceeded",
            RunStatus::Infeasible => "Infeasible",
        }
    }
}

/// Summary of a finished run, plus the accepted assignment when one exists.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub status: RunStatus,
    pub objective: Option<f64>,
    pub lower_bound: Option<f64>,
    pub upper_bound: Option<f64>,
    /// Lower bound reported by the first solve, before any cut tightened
    /// the formulation.
    pub relaxation: Option<f64>,
    /// Gap between the final objective and the relaxation value, percent.
    pub gap_percent: Option<f64>,
    /// Number of completed CUTTING transitions.
    pub iterations: usize,
    /// Total cuts injected into the pool.
    pub cuts_added: usize,
    /// Cumulative solver seconds across all oracle calls.
    pub solver_time: f64,
    pub assignment: Option<Assignment>,
}

impl std::fmt::Display for RunReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Status: {}", self.status.as_str())?;
        if let Some(obj) = self.objective {
            writeln!(f, "Objective: {:.2}", obj)?;
        }
        if let (Some(lb), Some(ub)) = (self.lower_bound, self.upper_bound) {
            writeln!(f, "Bounds: [{:.2}, {:.2}]", lb, ub)?;
        }
        if let Some(relax) = self.relaxation {
            writeln!(f, "Relaxation: {:.2}", relax)?;
        }
        if let Some(gap) = self.gap_percent {
            writeln!(f, "Gap: {:.4}%", gap)?;
        }
        writeln!(f, "Iterations: {}", self.iterations)?;
        writeln!(f, "Injected cuts: {}", self.cuts_added)?;
        write!(f, "Solver time: {:.4}s", self.solver_time)
    }
}

/// The cutting-plane loop over one oracle and one separator.
pub struct CutLoop<O: SolverOracle, S: Separator> {
    oracle: O,
    separator: S,
    config: LoopConfig,
}

struct Incumbent {
    assignment: Assignment,
    objective: Option<f64>,
    lower_bound: Option<f64>,
    upper_bound: Option<f64>,
}

impl<O: SolverOracle, S: Separator> CutLoop<O, S> {
    pub fn new(oracle: O, separator: S, config: LoopConfig) -> Self {
        CutLoop { oracle, separator, config }
    }

    /// Run the loop to a terminal state. Consumes and returns ownership of
    /// the model through the whole iteration; backend failures propagate.
    pub fn run(&mut self, mut model: Model) -> Result<RunReport> {
        let mut elapsed = 0.0;
        let mut iterations = 0usize;
        let mut relaxation: Option<f64> = None;
        let mut incumbent: Option<Incumbent> = None;

        loop {
            // SOLVING: never hand the oracle more than the remaining
            // global budget, so no single call can overshoot it.
            let remaining = (self.config.time_limit - elapsed).max(0.0);
            let outcome = self.oracle.solve(&model, remaining)?;
            elapsed += outcome.elapsed;

            if outcome.status == SolveStatus::Infeasible {
                info!("model infeasible after {} iterations", iterations);
                return Ok(self.report(
                    RunStatus::Infeasible,
                    incumbent,
                    relaxation,
                    iterations,
                    model.cuts().len(),
                    elapsed,
                ));
            }

            if relaxation.is_none() {
                relaxation = outcome.lower_bound;
            }

            let assignment = match outcome.assignment {
                Some(a) => a,
                None => {
                    // Per-call time-out without any incumbent from this
                    // call; the remaining budget was already the whole
                    // slice, so accept whatever earlier iterations found.
                    warn!("solver returned no assignment (status {:?})", outcome.status);
                    return Ok(self.report(
                        RunStatus::TimeExceeded,
                        incumbent,
                        relaxation,
                        iterations,
                        model.cuts().len(),
                        elapsed,
                    ));
                }
            };

            debug!(
                "iteration {}: solve {:.3}s, objective {:?}, {} cuts in pool",
                iterations,
                outcome.elapsed,
                outcome.objective,
                model.cuts().len()
            );

            incumbent = Some(Incumbent {
                assignment: assignment.clone(),
                objective: outcome.objective,
                lower_bound: outcome.lower_bound,
                upper_bound: outcome.upper_bound,
            });

            // SEPARATING: the separator sees the fully resolved assignment
            // of the immediately preceding solve.
            let cuts = self.separator.separate(&assignment);

            if cuts.is_empty() {
                info!(
                    "converged after {} iterations, {} cuts, {:.2}s solver time",
                    iterations,
                    model.cuts().len(),
                    elapsed
                );
                return Ok(self.report(
                    RunStatus::Converged,
                    incumbent,
                    relaxation,
                    iterations,
                    model.cuts().len(),
                    elapsed,
                ));
            }

            if elapsed >= self.config.time_limit {
                warn!(
                    "time budget exhausted ({:.2}s) with {} unresolved violations",
                    elapsed,
                    cuts.len()
                );
                return Ok(self.report(
                    RunStatus::TimeExceeded,
                    incumbent,
                    relaxation,
                    iterations,
                    model.cuts().len(),
                    elapsed,
                ));
            }

            // CUTTING
            info!("iteration {}: injecting {} cuts", iterations, cuts.len());
            model.inject_cuts(cuts);
            iterations += 1;
        }
    }

    fn report(
        &self,
        status: RunStatus,
        incumbent: Option<Incumbent>,
        relaxation: Option<f64>,
        iterations: usize,
        cuts_added: usize,
        solver_time: f64,
    ) -> RunReport {
        let (objective, lower_bound, upper_bound, assignment) = match incumbent {
            Some(inc) => (inc.objective, inc.lower_bound, inc.upper_bound, Some(inc.assignment)),
            None => (None, None, None, None),
        };
        let gap_percent = match (objective, relaxation) {
            (Some(obj), Some(relax)) if obj.abs() > f64::EPSILON => {
                Some((obj - relax).abs() / obj.abs() * 100.0)
            }
            _ => None,
        };
        RunReport {
            status,
            objective,
            lower_bound,
            upper_bound,
            relaxation,
            gap_percent,
            iterations,
            cuts_added,
            solver_time,
            assignment,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cuts::{Cut, CutTag};
    use crate::model::{LinExpr, ObjSense, VarId};
    use crate::oracle::SolveOutcome;
    use crate::separation::{ConnectivityCutSeparator, DEFAULT_TOLERANCE};
    use std::collections::HashMap;

    /// Oracle that replays a fixed list of outcomes, recording the cut
    /// pool size it saw on each call.
    struct ScriptedOracle {
        script: Vec<SolveOutcome>,
        call: usize,
        pool_sizes_seen: Vec<usize>,
    }

    impl ScriptedOracle {
        fn new(script: Vec<SolveOutcome>) -> Self {
            ScriptedOracle { script, call: 0, pool_sizes_seen: Vec::new() }
        }
    }

    impl SolverOracle for ScriptedOracle {
        fn solve(&mut self, model: &Model, _time_limit: f64) -> Result<SolveOutcome> {
            self.pool_sizes_seen.push(model.cuts().len());
            let outcome = self.script[self.call].clone();
            self.call += 1;
            Ok(outcome)
        }
    }

    fn outcome(
        status: SolveStatus,
        objective: f64,
        assignment: Option<Assignment>,
        elapsed: f64,
    ) -> SolveOutcome {
        SolveOutcome {
            status,
            objective: Some(objective),
            lower_bound: Some(objective),
            upper_bound: Some(objective),
            assignment,
            elapsed,
        }
    }

    /// Square graph 0-1-2-3-0 with unit weights, root 0, terminals {0,2}:
    /// directed arc variables in both orientations, terminal in-degree
    /// base constraint omitted (the scripted oracle ignores the model).
    fn square_setup() -> (Model, HashMap<(usize, usize), VarId>, ConnectivityCutSeparator) {
        let mut model = Model::new("steiner_square", ObjSense::Minimize);
        let edges = [(0usize, 1usize), (1, 2), (2, 3), (3, 0)];
        let mut arc_vars = HashMap::new();
        let mut adjacency = vec![Vec::new(); 4];
        for &(u, v) in &edges {
            adjacency[u].push(v);
            adjacency[v].push(u);
            arc_vars.insert((u, v), model.add_binary(format!("x_{}_{}", u, v), 1.0));
            arc_vars.insert((v, u), model.add_binary(format!("x_{}_{}", v, u), 1.0));
        }
        let separator = ConnectivityCutSeparator::new(
            4,
            0,
            &[0, 2],
            adjacency,
            arc_vars.clone(),
            DEFAULT_TOLERANCE,
        );
        (model, arc_vars, separator)
    }

    #[test]
    fn test_loop_converges_after_one_cut() {
        let (model, arc_vars, separator) = square_setup();
        let n = model.num_vars();

        // First solve: only edge (0,1) selected; terminal 2 disconnected.
        let mut first = Assignment::zeros(n);
        first.set(arc_vars[&(0, 1)], 1.0);
        // Second solve: path 0-1-2, total weight 2.
        let mut second = Assignment::zeros(n);
        second.set(arc_vars[&(0, 1)], 1.0);
        second.set(arc_vars[&(1, 2)], 1.0);

        let oracle = ScriptedOracle::new(vec![
            outcome(SolveStatus::Optimal, 1.0, Some(first), 0.1),
            outcome(SolveStatus::Optimal, 2.0, Some(second.clone()), 0.1),
        ]);

        let mut cut_loop = CutLoop::new(oracle, separator, LoopConfig::default());
        let report = cut_loop.run(model).expect("run failed");

        assert_eq!(report.status, RunStatus::Converged);
        assert_eq!(report.iterations, 1);
        assert!(report.cuts_added >= 1);
        assert_eq!(report.objective, Some(2.0));
        // The final assignment is a fixed point of the separator.
        let (_, _, separator) = square_setup();
        assert!(separator.separate(&second).is_empty());
        // Monotone pool: the second call saw a strictly larger pool.
        assert_eq!(cut_loop.oracle.pool_sizes_seen, vec![0, report.cuts_added]);
    }

    #[test]
    fn test_injected_cut_excludes_previous_assignment() {
        let (model, arc_vars, separator) = square_setup();
        let n = model.num_vars();

        let mut violating = Assignment::zeros(n);
        violating.set(arc_vars[&(0, 1)], 1.0);

        let cuts = separator.separate(&violating);
        assert!(!cuts.is_empty());

        let mut model = model;
        model.inject_cuts(cuts);
        // Feeding the previously discovered assignment back through the
        // updated model reports it infeasible for that assignment.
        assert!(model.violated_cut_count(&violating, DEFAULT_TOLERANCE) > 0);
    }

    #[test]
    fn test_time_budget_exceeded_keeps_incumbent() {
        let (model, arc_vars, separator) = square_setup();
        let n = model.num_vars();

        // A structurally violating incumbent returned by a solve that
        // already consumed the whole budget.
        let mut partial = Assignment::zeros(n);
        partial.set(arc_vars[&(0, 1)], 1.0);

        let oracle = ScriptedOracle::new(vec![outcome(
            SolveStatus::TimeLimit,
            1.0,
            Some(partial),
            10.0,
        )]);

        let config = LoopConfig { time_limit: 5.0, ..LoopConfig::default() };
        let mut cut_loop = CutLoop::new(oracle, separator, config);
        let report = cut_loop.run(model).expect("run failed");

        assert_eq!(report.status, RunStatus::TimeExceeded);
        assert_eq!(report.iterations, 0);
        // Best-effort incumbent is reported even though it violates
        // connectivity.
        assert!(report.assignment.is_some());
        assert_eq!(report.objective, Some(1.0));
    }

    #[test]
    fn test_time_budget_exceeded_without_any_incumbent() {
        let (model, _, separator) = square_setup();

        let oracle = ScriptedOracle::new(vec![SolveOutcome {
            status: SolveStatus::TimeLimit,
            objective: None,
            lower_bound: None,
            upper_bound: None,
            assignment: None,
            elapsed: 10.0,
        }]);

        let config = LoopConfig { time_limit: 5.0, ..LoopConfig::default() };
        let mut cut_loop = CutLoop::new(oracle, separator, config);
        let report = cut_loop.run(model).expect("run failed");

        assert_eq!(report.status, RunStatus::TimeExceeded);
        assert!(report.assignment.is_none());
        assert!(report.objective.is_none());
    }

    #[test]
    fn test_infeasible_model_terminates() {
        let (model, _, separator) = square_setup();

        let oracle = ScriptedOracle::new(vec![SolveOutcome::infeasible(0.2)]);
        let mut cut_loop = CutLoop::new(oracle, separator, LoopConfig::default());
        let report = cut_loop.run(model).expect("run failed");

        assert_eq!(report.status, RunStatus::Infeasible);
        assert_eq!(report.iterations, 0);
        assert!(report.assignment.is_none());
        assert!((report.solver_time - 0.2).abs() < 1e-9);
    }

    #[test]
    fn test_relaxation_recorded_from_first_solve() {
        let (model, arc_vars, separator) = square_setup();
        let n = model.num_vars();

        let mut first = Assignment::zeros(n);
        first.set(arc_vars[&(0, 1)], 1.0);
        let mut second = Assignment::zeros(n);
        second.set(arc_vars[&(0, 1)], 1.0);
        second.set(arc_vars[&(1, 2)], 1.0);

        let oracle = ScriptedOracle::new(vec![
            outcome(SolveStatus::Optimal, 1.0, Some(first), 0.1),
            outcome(SolveStatus::Optimal, 2.0, Some(second), 0.1),
        ]);

        let mut cut_loop = CutLoop::new(oracle, separator, LoopConfig::default());
        let report = cut_loop.run(model).expect("run failed");

        assert_eq!(report.relaxation, Some(1.0));
        let gap = report.gap_percent.expect("gap");
        assert!((gap - 50.0).abs() < 1e-9);
    }

    /// A separator that always reports the same violation would loop
    /// forever without the budget; the budget stops it.
    struct AlwaysViolated;

    impl Separator for AlwaysViolated {
        fn separate(&self, _assignment: &Assignment) -> Vec<Cut> {
            vec![Cut::new(
                "stub",
                LinExpr::new(),
                1.0,
                CutTag::Connectivity { component: vec![0] },
            )]
        }
    }

    #[test]
    fn test_budget_is_a_backstop_for_nonconverging_separation() {
        let mut model = Model::new("t", ObjSense::Minimize);
        let x = model.add_binary("x", 1.0);
        let n = model.num_vars();
        let _ = x;

        let step = |elapsed: f64| SolveOutcome {
            status: SolveStatus::Optimal,
            objective: Some(0.0),
            lower_bound: Some(0.0),
            upper_bound: Some(0.0),
            assignment: Some(Assignment::zeros(n)),
            elapsed,
        };
        let oracle = ScriptedOracle::new(vec![step(0.4), step(0.4), step(0.4)]);

        let config = LoopConfig { time_limit: 1.0, ..LoopConfig::default() };
        let mut cut_loop = CutLoop::new(oracle, AlwaysViolated, config);
        let report = cut_loop.run(model).expect("run failed");

        assert_eq!(report.status, RunStatus::TimeExceeded);
        // Two cutting transitions fit in the budget before exhaustion;
        // the third batch of violations is reported, not injected.
        assert_eq!(report.iterations, 2);
        assert_eq!(report.cuts_added, 2);
    }
}
