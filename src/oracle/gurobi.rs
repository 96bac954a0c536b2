//! Gurobi-backed solver oracle.
//!
//! Translates the backend-neutral model into a fresh Gurobi model on
//! every call and maps the solver status back onto [`SolveStatus`].

use grb::prelude::*;

use super::{OracleConfig, SolveOutcome, SolveStatus, SolverOracle};
use crate::error::{CutplaneError, Result};
use crate::model::{Assignment, Model as CutModel, ObjSense, Sense, VarKind};

/// Gurobi oracle. Keeps one environment alive across calls.
pub struct GurobiOracle {
    env: Env,
    config: OracleConfig,
}

impl GurobiOracle {
    pub fn new(config: OracleConfig) -> Result<Self> {
        let env = Env::new("")
            .map_err(|e| CutplaneError::SolverUnavailable(format!("gurobi environment: {}", e)))?;
        Ok(GurobiOracle { env, config })
    }

    fn build(&self, model: &CutModel) -> Result<(grb::Model, Vec<Var>)> {
        let backend = |e: grb::Error| CutplaneError::Backend(e.to_string());

        let mut grb_model = Model::with_env(model.name(), &self.env).map_err(backend)?;
        grb_model.set_param(param::MIPGap, self.config.mip_gap).map_err(backend)?;
        grb_model.set_param(param::Threads, self.config.threads).map_err(backend)?;
        if !self.config.verbose {
            grb_model.set_param(param::OutputFlag, 0).map_err(backend)?;
        }

        let mut vars = Vec::with_capacity(model.num_vars());
        for def in model.vars() {
            let var = match def.kind {
                VarKind::Binary => {
                    add_binvar!(grb_model, name: &def.name, obj: def.obj).map_err(backend)?
                }
                VarKind::Continuous { lb, ub } => {
                    add_ctsvar!(grb_model, name: &def.name, bounds: lb..ub, obj: def.obj)
                        .map_err(backend)?
                }
            };
            vars.push(var);
        }

        let sense = match model.obj_sense() {
            ObjSense::Minimize => ModelSense::Minimize,
            ObjSense::Maximize => ModelSense::Maximize,
        };
        grb_model.set_attr(attr::ModelSense, sense).map_err(backend)?;
        grb_model.update().map_err(backend)?;

        for constraint in model.all_constraints() {
            let expr: Expr = constraint
                .expr
                .terms()
                .iter()
                .map(|&(v, c)| c * vars[v.index()])
                .grb_sum();
            let result = match constraint.sense {
                Sense::Eq => grb_model.add_constr(&constraint.name, c!(expr == constraint.rhs)),
                Sense::Le => grb_model.add_constr(&constraint.name, c!(expr <= constraint.rhs)),
                Sense::Ge => grb_model.add_constr(&constraint.name, c!(expr >= constraint.rhs)),
            };
            result.map_err(backend)?;
        }

        grb_model.update().map_err(backend)?;
        Ok((grb_model, vars))
    }
}

impl SolverOracle for GurobiOracle {
    fn solve(&mut self, model: &CutModel, time_limit: f64) -> Result<SolveOutcome> {
        let backend = |e: grb::Error| CutplaneError::Backend(e.to_string());
        let start = std::time::Instant::now();

        let (mut grb_model, vars) = self.build(model)?;
        grb_model.set_param(param::TimeLimit, time_limit.max(0.0)).map_err(backend)?;
        grb_model.optimize().map_err(backend)?;

        let elapsed = start.elapsed().as_secs_f64();
        let status = grb_model.status().map_err(backend)?;

        let mapped = match status {
            Status::Optimal => SolveStatus::Optimal,
            Status::TimeLimit => SolveStatus::TimeLimit,
            Status::Infeasible | Status::InfOrUnbd => {
                return Ok(SolveOutcome::infeasible(elapsed));
            }
            other => {
                return Err(CutplaneError::Backend(format!(
                    "unexpected solver status {:?}",
                    other
                )));
            }
        };

        let sol_count: i32 = grb_model.get_attr(attr::SolCount).map_err(backend)?;
        let (objective, upper_bound, assignment) = if sol_count > 0 {
            let obj = grb_model.get_attr(attr::ObjVal).map_err(backend)?;
            let mut values = Vec::with_capacity(vars.len());
            for var in &vars {
                values.push(grb_model.get_obj_attr(attr::X, var).map_err(backend)?);
            }
            (Some(obj), Some(obj), Some(Assignment::from_values(values)))
        } else {
            (None, None, None)
        };
        let lower_bound = grb_model.get_attr(attr::ObjBound).ok();

        Ok(SolveOutcome { status: mapped, objective, lower_bound, upper_bound, assignment, elapsed })
    }
}
