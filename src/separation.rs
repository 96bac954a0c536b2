//! Separation engine: structural violation detection on solver assignments.
//!
//! Two concrete separators share the same selection predicate:
//!
//! - [`ConnectivityCutSeparator`] partitions the vertices into connected
//!   components of the selected-edge subgraph and emits a crossing cut for
//!   every component that contains a terminal but not the root.
//! - [`SubtourSeparator`] computes, per vehicle, the strongly connected
//!   components of the selected-arc digraph and emits visitation cuts for
//!   every component that excludes the depot.
//!
//! An empty violation set is the convergence condition of the outer loop.

use std::collections::{HashMap, VecDeque};

use crate::cuts::{Cut, CutTag};
use crate::model::{Assignment, LinExpr, VarId};

/// Default tolerance for classifying a relaxation value as selected.
pub const DEFAULT_TOLERANCE: f64 = 1e-4;

/// Central selection predicate: a variable is selected when its value is
/// within `tol` of 1.0. Every "is this edge/arc in the solution" decision
/// in the crate goes through here so both separators agree on what the
/// selected subgraph is.
#[inline]
pub fn is_selected(value: f64, tol: f64) -> bool {
    (1.0 - value).abs() < tol
}

/// A separation routine over one formulation's decision variables.
pub trait Separator {
    /// Inspect a fully resolved assignment and return all violated cuts.
    /// An empty result means the assignment is structurally feasible.
    fn separate(&self, assignment: &Assignment) -> Vec<Cut>;
}

/// Connectivity separation for the Steiner-tree formulation.
///
/// Holds the undirected graph topology and the directed arc variable map
/// (both orientations of every edge have a variable, as in the model).
pub struct ConnectivityCutSeparator {
    num_vertices: usize,
    root: usize,
    is_terminal: Vec<bool>,
    adjacency: Vec<Vec<usize>>,
    arc_vars: HashMap<(usize, usize), VarId>,
    tolerance: f64,
}

impl ConnectivityCutSeparator {
    pub fn new(
        num_vertices: usize,
        root: usize,
        terminals: &[usize],
        adjacency: Vec<Vec<usize>>,
        arc_vars: HashMap<(usize, usize), VarId>,
        tolerance: f64,
    ) -> Self {
        let mut is_terminal = vec![false; num_vertices];
        for &t in terminals {
            is_terminal[t] = true;
        }
        ConnectivityCutSeparator { num_vertices, root, is_terminal, adjacency, arc_vars, tolerance }
    }

    /// Whether the undirected edge {u, v} is selected in either orientation.
    fn edge_active(&self, assignment: &Assignment, u: usize, v: usize) -> bool {
        let fwd = self
            .arc_vars
            .get(&(u, v))
            .is_some_and(|&id| is_selected(assignment.value(id), self.tolerance));
        fwd || self
            .arc_vars
            .get(&(v, u))
            .is_some_and(|&id| is_selected(assignment.value(id), self.tolerance))
    }

    /// BFS from `start` over the selected subgraph, marking `visited`.
    fn component_from(&self, assignment: &Assignment, start: usize, visited: &mut [bool]) -> Vec<usize> {
        let mut component = vec![start];
        let mut queue = VecDeque::from([start]);
        visited[start] = true;

        while let Some(v) = queue.pop_front() {
            for &u in &self.adjacency[v] {
                if !visited[u] && self.edge_active(assignment, v, u) {
                    visited[u] = true;
                    component.push(u);
                    queue.push_back(u);
                }
            }
        }
        component
    }
}

impl Separator for ConnectivityCutSeparator {
    fn separate(&self, assignment: &Assignment) -> Vec<Cut> {
        let mut visited = vec![false; self.num_vertices];
        let mut cuts = Vec::new();

        // One sweep over unvisited start vertices discovers every
        // component of the selected subgraph, not just the root's.
        for start in 0..self.num_vertices {
            if visited[start] {
                continue;
            }
            let mut component = self.component_from(assignment, start, &mut visited);

            let has_root = component.contains(&self.root);
            let has_terminal = component.iter().any(|&v| self.is_terminal[v]);
            // The root's component never yields a cut, even when it also
            // contains terminals: those terminals are already connected.
            if has_root || !has_terminal {
                continue;
            }

            component.sort_unstable();
            let mut in_component = vec![false; self.num_vertices];
            for &v in &component {
                in_component[v] = true;
            }

            // At least one arc must enter the component from its
            // complement, forcing a connecting edge in the next solve.
            let mut crossing = LinExpr::new();
            for &j in &component {
                for &i in &self.adjacency[j] {
                    if !in_component[i] {
                        if let Some(&id) = self.arc_vars.get(&(i, j)) {
                            crossing.add_term(id, 1.0);
                        }
                    }
                }
            }

            cuts.push(Cut::new(
                format!("conn_v{}_s{}", component[0], component.len()),
                crossing,
                1.0,
                CutTag::Connectivity { component },
            ));
        }

        cuts
    }
}

/// Subtour separation for the vehicle-routing formulation.
///
/// Per vehicle, any strongly connected component of the selected-arc
/// digraph that excludes the depot is an illegal subtour; every node it
/// visits gets a cut tying its visitation indicator to the arcs leaving
/// the component.
pub struct SubtourSeparator {
    num_points: usize,
    num_vehicles: usize,
    depot: usize,
    arc_vars: HashMap<(usize, usize, usize), VarId>,
    visit_vars: HashMap<(usize, usize), VarId>,
    tolerance: f64,
}

impl SubtourSeparator {
    pub fn new(
        num_points: usize,
        num_vehicles: usize,
        arc_vars: HashMap<(usize, usize, usize), VarId>,
        visit_vars: HashMap<(usize, usize), VarId>,
        tolerance: f64,
    ) -> Self {
        SubtourSeparator { num_points, num_vehicles, depot: 0, arc_vars, visit_vars, tolerance }
    }

    /// Out-adjacency of the arcs vehicle `k` has selected.
    fn selected_digraph(&self, assignment: &Assignment, k: usize) -> Vec<Vec<usize>> {
        let mut adjacency = vec![Vec::new(); self.num_points];
        for (&(i, j, kk), &id) in &self.arc_vars {
            if kk == k && is_selected(assignment.value(id), self.tolerance) {
                adjacency[i].push(j);
            }
        }
        adjacency
    }
}

impl Separator for SubtourSeparator {
    fn separate(&self, assignment: &Assignment) -> Vec<Cut> {
        let mut cuts = Vec::new();

        // All vehicles are processed in one pass; the union of their
        // violations is returned together.
        for k in 0..self.num_vehicles {
            let adjacency = self.selected_digraph(assignment, k);

            for mut component in strongly_connected_components(&adjacency) {
                // Singleton components are nodes not on any selected
                // cycle (including unvisited nodes); only multi-node
                // components are closed subtours.
                if component.len() < 2 || component.contains(&self.depot) {
                    continue;
                }
                component.sort_unstable();

                let mut in_component = vec![false; self.num_points];
                for &v in &component {
                    in_component[v] = true;
                }

                // Arcs of vehicle k leaving the component.
                let mut leaving = LinExpr::new();
                for (&(i, j, kk), &id) in &self.arc_vars {
                    if kk == k && in_component[i] && !in_component[j] {
                        leaving.add_term(id, 1.0);
                    }
                }

                // One inequality per visited node h: if vehicle k visits
                // h then some arc of k must leave the component.
                for &h in &component {
                    if let Some(&y) = self.visit_vars.get(&(h, k)) {
                        let mut expr = leaving.clone();
                        expr.add_term(y, -1.0);
                        cuts.push(Cut::new(
                            format!("subtour_k{}_h{}", k, h),
                            expr,
                            0.0,
                            CutTag::Subtour { component: component.clone(), vehicle: k },
                        ));
                    }
                }
            }
        }

        cuts
    }
}

/// Tarjan's algorithm, iterative to keep the stack bounded on large
/// instances. Returns every SCC, singletons included.
pub fn strongly_connected_components(adjacency: &[Vec<usize>]) -> Vec<Vec<usize>> {
    const UNVISITED: usize = usize::MAX;

    let n = adjacency.len();
    let mut index = vec![UNVISITED; n];
    let mut low = vec![0usize; n];
    let mut on_stack = vec![false; n];
    let mut stack: Vec<usize> = Vec::new();
    let mut next_index = 0usize;
    let mut components = Vec::new();

    // Explicit DFS frames: (vertex, next child offset).
    let mut frames: Vec<(usize, usize)> = Vec::new();

    for root in 0..n {
        if index[root] != UNVISITED {
            continue;
        }
        index[root] = next_index;
        low[root] = next_index;
        next_index += 1;
        stack.push(root);
        on_stack[root] = true;
        frames.push((root, 0));

        while let Some(frame) = frames.last_mut() {
            let v = frame.0;
            if frame.1 < adjacency[v].len() {
                let w = adjacency[v][frame.1];
                frame.1 += 1;
                if index[w] == UNVISITED {
                    index[w] = next_index;
                    low[w] = next_index;
                    next_index += 1;
                    stack.push(w);
                    on_stack[w] = true;
                    frames.push((w, 0));
                } else if on_stack[w] {
                    low[v] = low[v].min(index[w]);
                }
            } else {
                frames.pop();
                if let Some(&(parent, _)) = frames.last() {
                    low[parent] = low[parent].min(low[v]);
                }
                if low[v] == index[v] {
                    let mut component = Vec::new();
                    while let Some(w) = stack.pop() {
                        on_stack[w] = false;
                        component.push(w);
                        if w == v {
                            break;
                        }
                    }
                    components.push(component);
                }
            }
        }
    }

    components
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Model, ObjSense};

    #[test]
    fn test_is_selected_boundaries() {
        assert!(is_selected(1.0, DEFAULT_TOLERANCE));
        assert!(is_selected(0.99995, DEFAULT_TOLERANCE));
        assert!(!is_selected(0.999, DEFAULT_TOLERANCE));
        assert!(!is_selected(0.5, DEFAULT_TOLERANCE));
        assert!(!is_selected(0.0, DEFAULT_TOLERANCE));
    }

    #[test]
    fn test_scc_two_cycles_and_isolated_node() {
        // 0 -> 1 -> 0 and 2 -> 3 -> 2, node 4 isolated.
        let adjacency = vec![vec![1], vec![0], vec![3], vec![2], vec![]];
        let mut sccs = strongly_connected_components(&adjacency);
        for scc in &mut sccs {
            scc.sort_unstable();
        }
        sccs.sort();
        assert_eq!(sccs, vec![vec![0, 1], vec![2, 3], vec![4]]);
    }

    #[test]
    fn test_scc_chain_is_all_singletons() {
        let adjacency = vec![vec![1], vec![2], vec![]];
        let sccs = strongly_connected_components(&adjacency);
        assert_eq!(sccs.len(), 3);
        assert!(sccs.iter().all(|s| s.len() == 1));
    }

    /// Square graph 0-1-2-3-0, root 0, terminals {0, 2}. Selecting only
    /// edge (0,1) must flag the component {0, 1}? No: {0, 1} contains the
    /// root. The flagged component is the one holding terminal 2.
    fn square_separator(model: &mut Model) -> (ConnectivityCutSeparator, HashMap<(usize, usize), VarId>) {
        let edges = [(0usize, 1usize), (1, 2), (2, 3), (3, 0)];
        let mut arc_vars = HashMap::new();
        let mut adjacency = vec![Vec::new(); 4];
        for &(u, v) in &edges {
            adjacency[u].push(v);
            adjacency[v].push(u);
            arc_vars.insert((u, v), model.add_binary(format!("x_{}_{}", u, v), 1.0));
            arc_vars.insert((v, u), model.add_binary(format!("x_{}_{}", v, u), 1.0));
        }
        let sep = ConnectivityCutSeparator::new(
            4,
            0,
            &[0, 2],
            adjacency,
            arc_vars.clone(),
            DEFAULT_TOLERANCE,
        );
        (sep, arc_vars)
    }

    #[test]
    fn test_connectivity_flags_disconnected_terminal() {
        let mut model = Model::new("t", ObjSense::Minimize);
        let (sep, arc_vars) = square_separator(&mut model);

        let mut assignment = Assignment::zeros(model.num_vars());
        assignment.set(arc_vars[&(0, 1)], 1.0);

        let cuts = sep.separate(&assignment);
        // Vertices 2 and 3 are isolated singleton components; only the one
        // containing terminal 2 yields a cut.
        assert_eq!(cuts.len(), 1);
        match cuts[0].tag() {
            CutTag::Connectivity { component } => assert_eq!(component, &vec![2]),
            other => panic!("unexpected tag {:?}", other),
        }
        // The crossing expression covers the arcs into vertex 2.
        assert!(cuts[0].is_violated_by(&assignment, DEFAULT_TOLERANCE));
    }

    #[test]
    fn test_connectivity_root_component_never_cut() {
        let mut model = Model::new("t", ObjSense::Minimize);
        let (sep, arc_vars) = square_separator(&mut model);

        // Root and both terminals connected: 0-1-2 path selected.
        let mut assignment = Assignment::zeros(model.num_vars());
        assignment.set(arc_vars[&(0, 1)], 1.0);
        assignment.set(arc_vars[&(1, 2)], 1.0);

        let cuts = sep.separate(&assignment);
        assert!(cuts.is_empty());
    }

    #[test]
    fn test_connectivity_either_orientation_counts() {
        let mut model = Model::new("t", ObjSense::Minimize);
        let (sep, arc_vars) = square_separator(&mut model);

        // Same path but with the reverse orientation on (1,2).
        let mut assignment = Assignment::zeros(model.num_vars());
        assignment.set(arc_vars[&(0, 1)], 1.0);
        assignment.set(arc_vars[&(2, 1)], 1.0);

        assert!(sep.separate(&assignment).is_empty());
    }

    fn small_vrp_separator(
        model: &mut Model,
        num_points: usize,
        num_vehicles: usize,
    ) -> (SubtourSeparator, HashMap<(usize, usize, usize), VarId>, HashMap<(usize, usize), VarId>) {
        let mut arc_vars = HashMap::new();
        let mut visit_vars = HashMap::new();
        for k in 0..num_vehicles {
            for i in 0..num_points {
                for j in 0..num_points {
                    if i != j {
                        arc_vars
                            .insert((i, j, k), model.add_binary(format!("x_{}_{}_{}", i, j, k), 0.0));
                    }
                }
                visit_vars.insert((i, k), model.add_binary(format!("y_{}_{}", i, k), 0.0));
            }
        }
        let sep = SubtourSeparator::new(
            num_points,
            num_vehicles,
            arc_vars.clone(),
            visit_vars.clone(),
            DEFAULT_TOLERANCE,
        );
        (sep, arc_vars, visit_vars)
    }

    #[test]
    fn test_subtour_two_disjoint_cycles_one_pass() {
        // Depot 0 plus customers 1..=4, one vehicle; relaxation yields two
        // disjoint 2-node cycles excluding the depot.
        let mut model = Model::new("t", ObjSense::Minimize);
        let (sep, arc_vars, visit_vars) = small_vrp_separator(&mut model, 5, 1);

        let mut assignment = Assignment::zeros(model.num_vars());
        for &(i, j) in &[(1, 2), (2, 1), (3, 4), (4, 3)] {
            assignment.set(arc_vars[&(i, j, 0)], 1.0);
        }
        for h in 1..=4 {
            assignment.set(visit_vars[&(h, 0)], 1.0);
        }

        let cuts = sep.separate(&assignment);

        // Both SCCs detected in a single pass, one inequality per node.
        let mut components: Vec<Vec<usize>> = cuts
            .iter()
            .map(|c| match c.tag() {
                CutTag::Subtour { component, vehicle: 0 } => component.clone(),
                other => panic!("unexpected tag {:?}", other),
            })
            .collect();
        components.dedup();
        assert_eq!(components, vec![vec![1, 2], vec![3, 4]]);
        assert_eq!(cuts.len(), 4);
        assert!(cuts.iter().all(|c| c.is_violated_by(&assignment, DEFAULT_TOLERANCE)));
    }

    #[test]
    fn test_subtour_depot_cycle_is_legal() {
        let mut model = Model::new("t", ObjSense::Minimize);
        let (sep, arc_vars, visit_vars) = small_vrp_separator(&mut model, 4, 1);

        // Single rooted tour 0 -> 1 -> 2 -> 3 -> 0.
        let mut assignment = Assignment::zeros(model.num_vars());
        for &(i, j) in &[(0, 1), (1, 2), (2, 3), (3, 0)] {
            assignment.set(arc_vars[&(i, j, 0)], 1.0);
        }
        for h in 0..4 {
            assignment.set(visit_vars[&(h, 0)], 1.0);
        }

        assert!(sep.separate(&assignment).is_empty());
    }

    #[test]
    fn test_subtour_per_vehicle_digraphs() {
        // Vehicle 0 has a legal depot tour over {0,1}; vehicle 1 has an
        // illegal 2-cycle over {2,3}. Only vehicle 1 yields cuts.
        let mut model = Model::new("t", ObjSense::Minimize);
        let (sep, arc_vars, visit_vars) = small_vrp_separator(&mut model, 4, 2);

        let mut assignment = Assignment::zeros(model.num_vars());
        for &(i, j) in &[(0, 1), (1, 0)] {
            assignment.set(arc_vars[&(i, j, 0)], 1.0);
        }
        for &(i, j) in &[(2, 3), (3, 2)] {
            assignment.set(arc_vars[&(i, j, 1)], 1.0);
        }
        assignment.set(visit_vars[&(0, 0)], 1.0);
        assignment.set(visit_vars[&(1, 0)], 1.0);
        assignment.set(visit_vars[&(2, 1)], 1.0);
        assignment.set(visit_vars[&(3, 1)], 1.0);

        let cuts = sep.separate(&assignment);
        assert_eq!(cuts.len(), 2);
        assert!(cuts.iter().all(|c| matches!(c.tag(), CutTag::Subtour { vehicle: 1, .. })));
    }
}
