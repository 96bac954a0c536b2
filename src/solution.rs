//! Final solution extraction and reporting.
//!
//! Turns the accepted assignment back into domain objects: the selected
//! Steiner edge set, or one depot-rooted visiting sequence per vehicle
//! with distance and travel time.

use serde::{Deserialize, Serialize};

use crate::formulation::steiner::SteinerVars;
use crate::formulation::vrp::VrpVars;
use crate::instance::{SteinerInstance, VrpInstance};
use crate::model::Assignment;
use crate::separation::is_selected;

/// The selected-edge subgraph of a Steiner run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SteinerTree {
    /// Undirected selected edges (u, v) with their weights.
    pub edges: Vec<(usize, usize, f64)>,
    pub total_weight: f64,
    /// Whether the selection connects the root to every terminal.
    pub connects_terminals: bool,
}

/// Extract the selected undirected edges and check root-terminal
/// connectivity over them.
pub fn extract_steiner_tree(
    instance: &SteinerInstance,
    vars: &SteinerVars,
    assignment: &Assignment,
    tolerance: f64,
) -> SteinerTree {
    let mut edges = Vec::new();
    let mut adjacency = vec![Vec::new(); instance.num_vertices];

    for e in &instance.edges {
        let fwd = vars
            .arcs
            .get(&(e.u, e.v))
            .is_some_and(|&id| is_selected(assignment.value(id), tolerance));
        let rev = vars
            .arcs
            .get(&(e.v, e.u))
            .is_some_and(|&id| is_selected(assignment.value(id), tolerance));
        if fwd || rev {
            edges.push((e.u, e.v, e.weight));
            adjacency[e.u].push(e.v);
            adjacency[e.v].push(e.u);
        }
    }

    // BFS from the root over the selected subgraph.
    let mut visited = vec![false; instance.num_vertices];
    let mut queue = std::collections::VecDeque::from([instance.root()]);
    visited[instance.root()] = true;
    while let Some(v) = queue.pop_front() {
        for &u in &adjacency[v] {
            if !visited[u] {
                visited[u] = true;
                queue.push_back(u);
            }
        }
    }
    let connects_terminals = instance.terminals.iter().all(|&t| visited[t]);

    let total_weight = edges.iter().map(|&(_, _, w)| w).sum();
    SteinerTree { edges, total_weight, connects_terminals }
}

impl std::fmt::Display for SteinerTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Selected edges ({}):", self.edges.len())?;
        for &(u, v, w) in &self.edges {
            writeln!(f, "  {} - {} (weight {:.2})", u + 1, v + 1, w)?;
        }
        writeln!(f, "Total weight: {:.2}", self.total_weight)?;
        write!(f, "Connects all terminals: {}", self.connects_terminals)
    }
}

/// One vehicle's route in a routing solution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VehicleRoute {
    pub vehicle: usize,
    /// Visiting sequence starting and ending at the depot.
    pub sequence: Vec<usize>,
    /// Total distance in meters.
    pub distance: f64,
    /// Travel time in minutes.
    pub travel_time: f64,
    /// Whether the walk closed back at the depot without revisiting a
    /// customer (false means the assignment still contains a subtour).
    pub closed: bool,
}

/// All vehicle routes of a routing run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutePlan {
    pub routes: Vec<VehicleRoute>,
}

impl RoutePlan {
    /// Longest travel time across the fleet, in minutes.
    pub fn makespan(&self) -> f64 {
        self.routes.iter().map(|r| r.travel_time).fold(0.0, f64::max)
    }
}

/// Walk each vehicle's selected arcs from the depot.
pub fn extract_route_plan(
    instance: &VrpInstance,
    vars: &VrpVars,
    assignment: &Assignment,
    tolerance: f64,
) -> RoutePlan {
    let n = instance.num_points();
    let mut routes = Vec::with_capacity(instance.num_vehicles());

    for (k, vehicle) in instance.vehicles.iter().enumerate() {
        let mut sequence = vec![0usize];
        let mut visited = vec![false; n];
        let mut current = 0usize;
        let mut closed = false;

        loop {
            let next = (0..n).find(|&j| {
                j != current
                    && vars
                        .arcs
                        .get(&(current, j, k))
                        .is_some_and(|&id| is_selected(assignment.value(id), tolerance))
            });
            match next {
                Some(0) | None => {
                    closed = next == Some(0);
                    break;
                }
                Some(j) if visited[j] => {
                    // Subtour in a best-effort incumbent; stop the walk.
                    break;
                }
                Some(j) => {
                    visited[j] = true;
                    sequence.push(j);
                    current = j;
                }
            }
        }
        sequence.push(0);

        let distance: f64 = sequence
            .windows(2)
            .map(|w| instance.distance(w[0], w[1]))
            .sum();
        let travel_time = distance / vehicle.speed / 60.0;

        routes.push(VehicleRoute { vehicle: k, sequence, distance, travel_time, closed });
    }

    RoutePlan { routes }
}

impl std::fmt::Display for RoutePlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for route in &self.routes {
            let sequence: Vec<String> = route.sequence.iter().map(|i| i.to_string()).collect();
            writeln!(
                f,
                "Vehicle {} route: {} | distance {:.2} km | travel time {:.2} min",
                route.vehicle,
                sequence.join(" -> "),
                route.distance / 1000.0,
                route.travel_time
            )?;
        }
        write!(f, "Fleet makespan: {:.2} min", self.makespan())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formulation::{steiner, vrp};
    use crate::instance::{Point, Vehicle};
    use crate::separation::DEFAULT_TOLERANCE;
    use std::io::Cursor;

    #[test]
    fn test_extract_steiner_tree() {
        let text = "4 4\n1 2 1\n2 3 1\n3 4 1\n4 1 1\n2\n1\n3\n";
        let instance =
            SteinerInstance::from_reader("square".to_string(), Cursor::new(text)).expect("parse");
        let (model, vars) = steiner::build_model(&instance);

        let mut assignment = Assignment::zeros(model.num_vars());
        assignment.set(vars.arcs[&(0, 1)], 1.0);
        // Reverse orientation still selects the undirected edge.
        assignment.set(vars.arcs[&(2, 1)], 1.0);

        let tree = extract_steiner_tree(&instance, &vars, &assignment, DEFAULT_TOLERANCE);
        assert_eq!(tree.edges.len(), 2);
        assert!((tree.total_weight - 2.0).abs() < 1e-9);
        assert!(tree.connects_terminals);
    }

    #[test]
    fn test_extract_steiner_tree_detects_disconnection() {
        let text = "4 4\n1 2 1\n2 3 1\n3 4 1\n4 1 1\n2\n1\n3\n";
        let instance =
            SteinerInstance::from_reader("square".to_string(), Cursor::new(text)).expect("parse");
        let (model, vars) = steiner::build_model(&instance);

        let mut assignment = Assignment::zeros(model.num_vars());
        assignment.set(vars.arcs[&(0, 1)], 1.0);

        let tree = extract_steiner_tree(&instance, &vars, &assignment, DEFAULT_TOLERANCE);
        assert!(!tree.connects_terminals);
    }

    #[test]
    fn test_extract_route_plan() {
        let instance = VrpInstance::from_parts(
            "plan".to_string(),
            vec![
                Point { x: 0.0, y: 0.0 },
                Point { x: 100.0, y: 0.0 },
                Point { x: 100.0, y: 100.0 },
            ],
            vec![Vehicle { battery: 60.0, speed: 10.0 }],
        );
        let (model, vars) = vrp::build_model(&instance);

        let mut assignment = Assignment::zeros(model.num_vars());
        for &(i, j) in &[(0usize, 1usize), (1, 2), (2, 0)] {
            assignment.set(vars.arcs[&(i, j, 0)], 1.0);
        }

        let plan = extract_route_plan(&instance, &vars, &assignment, DEFAULT_TOLERANCE);
        assert_eq!(plan.routes.len(), 1);
        let route = &plan.routes[0];
        assert_eq!(route.sequence, vec![0, 1, 2, 0]);
        assert!(route.closed);
        let expected = 100.0 + 100.0 + (2.0f64 * 100.0 * 100.0).sqrt();
        assert!((route.distance - expected).abs() < 1e-9);
        assert!((route.travel_time - expected / 10.0 / 60.0).abs() < 1e-9);
        assert!((plan.makespan() - route.travel_time).abs() < 1e-12);
    }

    #[test]
    fn test_route_walk_stops_on_subtour() {
        let instance = VrpInstance::from_parts(
            "sub".to_string(),
            vec![
                Point { x: 0.0, y: 0.0 },
                Point { x: 100.0, y: 0.0 },
                Point { x: 100.0, y: 100.0 },
            ],
            vec![Vehicle { battery: 60.0, speed: 10.0 }],
        );
        let (model, vars) = vrp::build_model(&instance);

        // Depot-less 2-cycle: the walk never leaves the depot.
        let mut assignment = Assignment::zeros(model.num_vars());
        assignment.set(vars.arcs[&(1, 2, 0)], 1.0);
        assignment.set(vars.arcs[&(2, 1, 0)], 1.0);

        let plan = extract_route_plan(&instance, &vars, &assignment, DEFAULT_TOLERANCE);
        assert_eq!(plan.routes[0].sequence, vec![0, 0]);
        assert!(!plan.routes[0].closed);
    }
}
