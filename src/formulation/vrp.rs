//! Vehicle-routing base formulation.
//!
//! Binary arc variables x[i,j,k] per vehicle, visitation indicators
//! y[i,k], and a continuous makespan variable minimized as the objective.
//! Base constraints: depot degree equals the fleet size, every customer
//! is entered and left exactly once, arc degrees are tied to the
//! visitation indicators, and each vehicle respects its coverage capacity
//! and the makespan. Subtours are eliminated lazily by
//! [`SubtourSeparator`] cuts.

use std::collections::HashMap;

use crate::instance::VrpInstance;
use crate::model::{Constraint, LinExpr, Model, ObjSense, Sense, VarId};
use crate::separation::SubtourSeparator;

/// Variable map of the routing formulation.
pub struct VrpVars {
    /// x[i,j,k]: vehicle k travels the arc (i, j), i != j.
    pub arcs: HashMap<(usize, usize, usize), VarId>,
    /// y[i,k]: vehicle k visits point i.
    pub visits: HashMap<(usize, usize), VarId>,
    /// Maximum travel time over the fleet, in seconds.
    pub max_time: VarId,
}

/// Declare variables and base constraints for the instance.
pub fn build_model(instance: &VrpInstance) -> (Model, VrpVars) {
    let n = instance.num_points();
    let fleet = instance.num_vehicles();
    let mut model = Model::new(format!("vrp_{}", instance.name), ObjSense::Minimize);

    // Objective: minimize the slowest vehicle's travel time.
    let max_time = model.add_continuous("max_time", 0.0, f64::INFINITY, 1.0);

    let mut arcs: HashMap<(usize, usize, usize), VarId> = HashMap::new();
    let mut visits: HashMap<(usize, usize), VarId> = HashMap::new();
    for k in 0..fleet {
        for i in 0..n {
            for j in 0..n {
                if i != j {
                    let id = model.add_binary(format!("x_{}_{}_{}", i, j, k), 0.0);
                    arcs.insert((i, j, k), id);
                }
            }
            let id = model.add_binary(format!("y_{}_{}", i, k), 0.0);
            visits.insert((i, k), id);
        }
    }

    for i in 0..n {
        let out_all = LinExpr::sum_of(
            (0..fleet).flat_map(|k| (0..n).filter(move |&j| j != i).map(move |j| (i, j, k)))
                .map(|key| arcs[&key]),
        );
        let in_all = LinExpr::sum_of(
            (0..fleet).flat_map(|k| (0..n).filter(move |&j| j != i).map(move |j| (j, i, k)))
                .map(|key| arcs[&key]),
        );
        if i == 0 {
            // Every vehicle leaves the depot and returns to it.
            model.add_constraint(Constraint::new("depot_out", out_all, Sense::Eq, fleet as f64));
            model.add_constraint(Constraint::new("depot_in", in_all, Sense::Eq, fleet as f64));
        } else {
            // Each customer is entered and left exactly once, fleet-wide.
            model.add_constraint(Constraint::new(format!("out_{}", i), out_all, Sense::Eq, 1.0));
            model.add_constraint(Constraint::new(format!("in_{}", i), in_all, Sense::Eq, 1.0));
        }

        // Visitation link: vehicle k's degree at i equals y[i,k].
        for k in 0..fleet {
            let mut out_k = LinExpr::sum_of(
                (0..n).filter(|&j| j != i).map(|j| arcs[&(i, j, k)]),
            );
            out_k.add_term(visits[&(i, k)], -1.0);
            model.add_constraint(Constraint::new(format!("visit_out_{}_{}", i, k), out_k, Sense::Eq, 0.0));

            let mut in_k = LinExpr::sum_of(
                (0..n).filter(|&j| j != i).map(|j| arcs[&(j, i, k)]),
            );
            in_k.add_term(visits[&(i, k)], -1.0);
            model.add_constraint(Constraint::new(format!("visit_in_{}_{}", i, k), in_k, Sense::Eq, 0.0));
        }
    }

    for (k, vehicle) in instance.vehicles.iter().enumerate() {
        // Distance travelled must fit the vehicle's coverage capacity.
        let mut travelled = LinExpr::with_capacity(n * (n - 1));
        // Travel time must not exceed the makespan variable.
        let mut time = LinExpr::with_capacity(n * (n - 1) + 1);
        for i in 0..n {
            for j in 0..n {
                if i != j {
                    let d = instance.distance(i, j);
                    travelled.add_term(arcs[&(i, j, k)], d);
                    time.add_term(arcs[&(i, j, k)], d / vehicle.speed);
                }
            }
        }
        model.add_constraint(Constraint::new(
            format!("coverage_{}", k),
            travelled,
            Sense::Le,
            vehicle.coverage(),
        ));
        time.add_term(max_time, -1.0);
        model.add_constraint(Constraint::new(format!("makespan_{}", k), time, Sense::Le, 0.0));
    }

    (model, VrpVars { arcs, visits, max_time })
}

/// The subtour separator for this instance's variable map.
pub fn separator(instance: &VrpInstance, vars: &VrpVars, tolerance: f64) -> SubtourSeparator {
    SubtourSeparator::new(
        instance.num_points(),
        instance.num_vehicles(),
        vars.arcs.clone(),
        vars.visits.clone(),
        tolerance,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::{Point, Vehicle};
    use crate::model::Assignment;

    fn small() -> VrpInstance {
        VrpInstance::from_parts(
            "small".to_string(),
            vec![
                Point { x: 0.0, y: 0.0 },
                Point { x: 100.0, y: 0.0 },
                Point { x: 0.0, y: 100.0 },
            ],
            vec![Vehicle { battery: 30.0, speed: 10.0 }, Vehicle { battery: 20.0, speed: 5.0 }],
        )
    }

    #[test]
    fn test_build_small_model() {
        let instance = small();
        let (model, vars) = build_model(&instance);

        let n = 3;
        let fleet = 2;
        // max_time + arcs + visits
        assert_eq!(model.num_vars(), 1 + fleet * n * (n - 1) + fleet * n);
        assert_eq!(vars.arcs.len(), fleet * n * (n - 1));
        assert_eq!(vars.visits.len(), fleet * n);
        // 2 depot + 2 per customer + 2 visit links per (point, vehicle)
        // + coverage and makespan per vehicle.
        assert_eq!(
            model.base_constraints().len(),
            2 + 2 * (n - 1) + 2 * n * fleet + 2 * fleet
        );
    }

    #[test]
    fn test_base_constraints_accept_single_rooted_tour() {
        // One vehicle visiting both customers, the other idle is NOT
        // allowed by the depot degree constraint with fleet = 2, so use a
        // split: vehicle 0 covers customer 1, vehicle 1 covers customer 2.
        let instance = small();
        let (model, vars) = build_model(&instance);

        let mut assignment = Assignment::zeros(model.num_vars());
        for &(i, j, k) in &[(0usize, 1usize, 0usize), (1, 0, 0), (0, 2, 1), (2, 0, 1)] {
            assignment.set(vars.arcs[&(i, j, k)], 1.0);
        }
        for &(i, k) in &[(0usize, 0usize), (1, 0), (0, 1), (2, 1)] {
            assignment.set(vars.visits[&(i, k)], 1.0);
        }
        // Vehicle 0: 200 m at 10 m/s = 20 s; vehicle 1: 200 m at 5 m/s = 40 s.
        assignment.set(vars.max_time, 40.0);

        let tol = 1e-6;
        for constraint in model.base_constraints() {
            assert!(
                constraint.satisfied_by(&assignment, tol),
                "violated: {}",
                constraint.name
            );
        }
    }

    #[test]
    fn test_coverage_constraint_binds() {
        let instance = small();
        let (model, vars) = build_model(&instance);

        // Vehicle 1 has coverage 5 * 60 * 20 = 6000 m; a fake assignment
        // claiming 3 arcs of ~141 m each stays within it, so to violate
        // coverage we scale distances via many arcs instead: simply check
        // the constraint evaluates distance, not arc count.
        let coverage = model
            .base_constraints()
            .iter()
            .find(|c| c.name == "coverage_1")
            .expect("constraint");
        let mut assignment = Assignment::zeros(model.num_vars());
        assignment.set(vars.arcs[&(1, 2, 1)], 1.0);
        let lhs = coverage.expr.value(&assignment);
        assert!((lhs - instance.distance(1, 2)).abs() < 1e-9);
    }
}
