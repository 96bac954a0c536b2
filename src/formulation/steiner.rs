//! Steiner-tree base formulation.
//!
//! One binary arc variable per orientation of every undirected edge, with
//! the edge weight as objective coefficient; selecting either orientation
//! pays for the edge once. The only base constraints fix the in-degree of
//! every non-root terminal to one. Connectivity is enforced lazily by
//! [`ConnectivityCutSeparator`] cuts.

use std::collections::HashMap;

use crate::instance::SteinerInstance;
use crate::model::{Constraint, LinExpr, Model, ObjSense, Sense, VarId};
use crate::separation::ConnectivityCutSeparator;

/// Variable map of the Steiner formulation: directed arcs, both
/// orientations of every edge.
pub struct SteinerVars {
    pub arcs: HashMap<(usize, usize), VarId>,
}

/// Declare variables and base constraints for the instance.
pub fn build_model(instance: &SteinerInstance) -> (Model, SteinerVars) {
    let mut model = Model::new(format!("steiner_{}", instance.name), ObjSense::Minimize);

    let mut arcs: HashMap<(usize, usize), VarId> = HashMap::new();
    for e in &instance.edges {
        for (i, j) in [(e.u, e.v), (e.v, e.u)] {
            if !arcs.contains_key(&(i, j)) {
                let id = model.add_binary(format!("x_{}_{}", i, j), e.weight);
                arcs.insert((i, j), id);
            }
        }
    }

    // Each terminal other than the root takes exactly one incoming arc.
    let adjacency = instance.adjacency();
    for t in instance.non_root_terminals() {
        let expr = LinExpr::sum_of(adjacency[t].iter().map(|&i| arcs[&(i, t)]));
        model.add_constraint(Constraint::new(format!("deg_t{}", t), expr, Sense::Eq, 1.0));
    }

    (model, SteinerVars { arcs })
}

/// The connectivity separator for this instance's variable map.
pub fn separator(
    instance: &SteinerInstance,
    vars: &SteinerVars,
    tolerance: f64,
) -> ConnectivityCutSeparator {
    ConnectivityCutSeparator::new(
        instance.num_vertices,
        instance.root(),
        &instance.terminals,
        instance.adjacency(),
        vars.arcs.clone(),
        tolerance,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn square() -> SteinerInstance {
        let text = "4 4\n1 2 1\n2 3 1\n3 4 1\n4 1 1\n2\n1\n3\n";
        SteinerInstance::from_reader("square".to_string(), Cursor::new(text)).expect("parse")
    }

    #[test]
    fn test_build_square_model() {
        let instance = square();
        let (model, vars) = build_model(&instance);

        // Both orientations of all 4 edges.
        assert_eq!(model.num_vars(), 8);
        assert_eq!(vars.arcs.len(), 8);
        // One in-degree constraint for the single non-root terminal.
        assert_eq!(model.base_constraints().len(), 1);
        assert!(model.cuts().is_empty());
    }

    #[test]
    fn test_objective_carries_edge_weights() {
        let text = "3 2\n1 2 5\n2 3 7\n2\n1\n3\n";
        let instance =
            SteinerInstance::from_reader("weights".to_string(), Cursor::new(text)).expect("parse");
        let (model, vars) = build_model(&instance);

        let forward = vars.arcs[&(0, 1)];
        let reverse = vars.arcs[&(1, 0)];
        assert_eq!(model.vars()[forward.index()].obj, 5.0);
        assert_eq!(model.vars()[reverse.index()].obj, 5.0);
        let heavy = vars.arcs[&(1, 2)];
        assert_eq!(model.vars()[heavy.index()].obj, 7.0);
    }
}
