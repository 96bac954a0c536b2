//! Parsing and representation of problem instances.
//!
//! Two text formats are supported:
//!
//! - Steiner: `n m`, then `m` lines `u v w` (1-indexed endpoints, edge
//!   weight) for an undirected weighted graph, then `t`, then `t` lines
//!   with one terminal id each. The first terminal is the root.
//! - Routing: `n v` (point count, vehicle count), then `n` lines `x y`
//!   (point 0 is the depot), then `v` lines `battery speed` per vehicle.

use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{CutplaneError, Result};

/// Line-oriented reader that tracks the line number for error messages.
struct LineParser<R: BufRead> {
    reader: R,
    line_no: usize,
}

impl<R: BufRead> LineParser<R> {
    fn new(reader: R) -> Self {
        LineParser { reader, line_no: 0 }
    }

    /// Next non-empty line, trimmed.
    fn next_line(&mut self) -> Result<String> {
        loop {
            let mut line = String::new();
            let read = self.reader.read_line(&mut line)?;
            if read == 0 {
                return Err(CutplaneError::MalformedInput(format!(
                    "unexpected end of input after line {}",
                    self.line_no
                )));
            }
            self.line_no += 1;
            let trimmed = line.trim();
            if !trimmed.is_empty() {
                return Ok(trimmed.to_string());
            }
        }
    }

    /// Parse exactly `count` whitespace-separated fields from one line.
    fn fields<T: std::str::FromStr>(&mut self, count: usize, what: &str) -> Result<Vec<T>> {
        let line = self.next_line()?;
        let line_no = self.line_no;
        let parsed: std::result::Result<Vec<T>, _> =
            line.split_whitespace().map(str::parse).collect();
        match parsed {
            Ok(values) if values.len() == count => Ok(values),
            _ => Err(CutplaneError::MalformedInput(format!(
                "line {}: expected {} ({} values), got `{}`",
                line_no, what, count, line
            ))),
        }
    }
}

/// An undirected weighted edge, 0-indexed endpoints.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SteinerEdge {
    pub u: usize,
    pub v: usize,
    pub weight: f64,
}

/// A Steiner-tree instance: undirected weighted graph, root, terminals.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SteinerInstance {
    pub name: String,
    pub num_vertices: usize,
    pub edges: Vec<SteinerEdge>,
    /// 0-indexed terminal ids; the first one is the designated root.
    pub terminals: Vec<usize>,
}

impl SteinerInstance {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let name = instance_name(path.as_ref());
        let file = File::open(&path)?;
        Self::from_reader(name, BufReader::new(file))
    }

    pub fn from_reader<R: BufRead>(name: String, reader: R) -> Result<Self> {
        let mut parser = LineParser::new(reader);

        let header: Vec<usize> = parser.fields(2, "vertex and edge count")?;
        let (num_vertices, num_edges) = (header[0], header[1]);
        if num_vertices == 0 {
            return Err(CutplaneError::MalformedInput("empty vertex set".to_string()));
        }

        let mut edges = Vec::with_capacity(num_edges);
        for _ in 0..num_edges {
            let fields: Vec<f64> = parser.fields(3, "edge `u v w`")?;
            let (u, v, weight) = (fields[0] as usize, fields[1] as usize, fields[2]);
            if u < 1 || u > num_vertices || v < 1 || v > num_vertices {
                return Err(CutplaneError::MalformedInput(format!(
                    "edge endpoint out of range: ({}, {}) with n = {}",
                    u, v, num_vertices
                )));
            }
            if weight < 0.0 {
                return Err(CutplaneError::MalformedInput(format!(
                    "negative edge weight {} on ({}, {})",
                    weight, u, v
                )));
            }
            edges.push(SteinerEdge { u: u - 1, v: v - 1, weight });
        }

        let num_terminals: usize = parser.fields::<usize>(1, "terminal count")?[0];
        if num_terminals == 0 {
            return Err(CutplaneError::MalformedInput(
                "at least one terminal (the root) is required".to_string(),
            ));
        }
        let mut terminals = Vec::with_capacity(num_terminals);
        for _ in 0..num_terminals {
            let id: usize = parser.fields::<usize>(1, "terminal id")?[0];
            if id < 1 || id > num_vertices {
                return Err(CutplaneError::MalformedInput(format!(
                    "terminal {} out of range with n = {}",
                    id, num_vertices
                )));
            }
            terminals.push(id - 1);
        }

        Ok(SteinerInstance { name, num_vertices, edges, terminals })
    }

    /// The designated root: the first terminal.
    pub fn root(&self) -> usize {
        self.terminals[0]
    }

    /// Terminals that must be connected to the root.
    pub fn non_root_terminals(&self) -> impl Iterator<Item = usize> + '_ {
        self.terminals.iter().skip(1).copied()
    }

    /// Undirected neighbor lists.
    pub fn adjacency(&self) -> Vec<Vec<usize>> {
        let mut adjacency = vec![Vec::new(); self.num_vertices];
        for e in &self.edges {
            adjacency[e.u].push(e.v);
            adjacency[e.v].push(e.u);
        }
        adjacency
    }

    pub fn total_weight(&self) -> f64 {
        self.edges.iter().map(|e| e.weight).sum()
    }
}

impl std::fmt::Display for SteinerInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Instance: {}", self.name)?;
        writeln!(f, "  Vertices: {}", self.num_vertices)?;
        writeln!(f, "  Edges: {}", self.edges.len())?;
        writeln!(f, "  Terminals: {} (root {})", self.terminals.len(), self.root() + 1)?;
        write!(f, "  Total edge weight: {:.2}", self.total_weight())
    }
}

/// A 2D visit point.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

/// A vehicle with a battery budget (minutes) and a speed (m/s).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Vehicle {
    pub battery: f64,
    pub speed: f64,
}

impl Vehicle {
    /// Coverage capacity in meters: distance reachable within the
    /// battery budget at cruise speed.
    #[inline]
    pub fn coverage(&self) -> f64 {
        self.speed * 60.0 * self.battery
    }
}

/// A routing instance: visit points (0 is the depot) and a vehicle fleet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VrpInstance {
    pub name: String,
    pub points: Vec<Point>,
    pub vehicles: Vec<Vehicle>,
    /// Precomputed Euclidean distances.
    #[serde(skip)]
    pub distance_matrix: Vec<Vec<f64>>,
}

impl VrpInstance {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let name = instance_name(path.as_ref());
        let file = File::open(&path)?;
        Self::from_reader(name, BufReader::new(file))
    }

    pub fn from_reader<R: BufRead>(name: String, reader: R) -> Result<Self> {
        let mut parser = LineParser::new(reader);

        let header: Vec<usize> = parser.fields(2, "point and vehicle count")?;
        let (num_points, num_vehicles) = (header[0], header[1]);
        if num_points == 0 {
            return Err(CutplaneError::MalformedInput("no visit points".to_string()));
        }
        if num_vehicles == 0 {
            return Err(CutplaneError::MalformedInput("no vehicles".to_string()));
        }

        let mut points = Vec::with_capacity(num_points);
        for _ in 0..num_points {
            let fields: Vec<f64> = parser.fields(2, "point coordinates `x y`")?;
            points.push(Point { x: fields[0], y: fields[1] });
        }

        let mut vehicles = Vec::with_capacity(num_vehicles);
        for _ in 0..num_vehicles {
            let fields: Vec<f64> = parser.fields(2, "vehicle `battery speed`")?;
            if fields[1] <= 0.0 {
                return Err(CutplaneError::MalformedInput(format!(
                    "vehicle speed must be positive, got {}",
                    fields[1]
                )));
            }
            vehicles.push(Vehicle { battery: fields[0], speed: fields[1] });
        }

        Ok(Self::from_parts(name, points, vehicles))
    }

    pub fn from_parts(name: String, points: Vec<Point>, vehicles: Vec<Vehicle>) -> Self {
        let distance_matrix = compute_distance_matrix(&points);
        VrpInstance { name, points, vehicles, distance_matrix }
    }

    #[inline]
    pub fn distance(&self, i: usize, j: usize) -> f64 {
        self.distance_matrix[i][j]
    }

    pub fn num_points(&self) -> usize {
        self.points.len()
    }

    pub fn num_vehicles(&self) -> usize {
        self.vehicles.len()
    }

    /// Generate a random instance the way the reference test generator
    /// does: integer coordinates in [-10000, 10000], vehicle speed in
    /// [5, 15) m/s, battery calibrated so the fleet's coverage tracks the
    /// mean pairwise distance. Deterministic via seed.
    pub fn generate(name: String, num_points: usize, num_vehicles: usize, seed: u64) -> Self {
        use rand::prelude::*;
        use rand_chacha::ChaCha8Rng;

        let mut rng = ChaCha8Rng::seed_from_u64(seed);

        let points: Vec<Point> = (0..num_points)
            .map(|_| Point {
                x: rng.gen_range(-10000..=10000) as f64,
                y: rng.gen_range(-10000..=10000) as f64,
            })
            .collect();

        let mut total = 0.0;
        let mut pairs = 0usize;
        for i in 0..num_points {
            for j in i + 1..num_points {
                total += euclidean(&points[i], &points[j]);
                pairs += 1;
            }
        }
        let avg_distance = if pairs > 0 { total / pairs as f64 } else { 0.0 };

        let vehicles: Vec<Vehicle> = (0..num_vehicles)
            .map(|_| {
                let speed = rng.gen_range(5.0..15.0);
                let battery = (avg_distance / speed) / num_vehicles as f64 - 1.0;
                Vehicle { battery, speed }
            })
            .collect();

        Self::from_parts(name, points, vehicles)
    }

    /// Write the instance back out in the input text format.
    pub fn write_to<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut file = File::create(path)?;
        writeln!(file, "{} {}", self.num_points(), self.num_vehicles())?;
        for p in &self.points {
            writeln!(file, "{} {}", p.x, p.y)?;
        }
        for v in &self.vehicles {
            writeln!(file, "{:.2} {:.2}", v.battery, v.speed)?;
        }
        Ok(())
    }
}

impl std::fmt::Display for VrpInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Instance: {}", self.name)?;
        writeln!(
            f,
            "  Points: {} (1 depot + {} customers)",
            self.num_points(),
            self.num_points() - 1
        )?;
        writeln!(f, "  Vehicles: {}", self.num_vehicles())?;
        for (k, v) in self.vehicles.iter().enumerate() {
            writeln!(
                f,
                "  Vehicle {}: battery {:.2} min | speed {:.2} m/s | coverage {:.2} km",
                k,
                v.battery,
                v.speed,
                v.coverage() / 1000.0
            )?;
        }
        let mut distances: Vec<f64> = Vec::new();
        for i in 0..self.num_points() {
            for j in i + 1..self.num_points() {
                distances.push(self.distance(i, j));
            }
        }
        let avg = if distances.is_empty() {
            0.0
        } else {
            distances.iter().sum::<f64>() / distances.len() as f64
        };
        write!(f, "  Avg pairwise distance: {:.2}", avg)
    }
}

fn euclidean(a: &Point, b: &Point) -> f64 {
    let dx = a.x - b.x;
    let dy = a.y - b.y;
    (dx * dx + dy * dy).sqrt()
}

fn compute_distance_matrix(points: &[Point]) -> Vec<Vec<f64>> {
    let n = points.len();
    let mut matrix = vec![vec![0.0; n]; n];
    for i in 0..n {
        for j in 0..n {
            if i != j {
                matrix[i][j] = euclidean(&points[i], &points[j]);
            }
        }
    }
    matrix
}

fn instance_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "instance".to_string())
}
