//! Backend-neutral MILP model representation.
//!
//! The model is a plain value: variable declarations, linear constraints,
//! an objective, and the growing cut pool. It carries no solver handles,
//! so the control loop and the separators have zero dependency on the
//! concrete backend. A solver oracle translates the model on every call.

use crate::cuts::{Cut, CutPool};

/// Identifier of a decision variable inside one model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VarId(usize);

impl VarId {
    #[inline]
    pub fn index(self) -> usize {
        self.0
    }
}

/// Kind and bounds of a decision variable.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VarKind {
    Binary,
    Continuous { lb: f64, ub: f64 },
}

/// A declared decision variable.
#[derive(Debug, Clone)]
pub struct VarDef {
    pub name: String,
    pub kind: VarKind,
    /// Coefficient in the objective function.
    pub obj: f64,
}

/// Sparse linear expression over decision variables.
#[derive(Debug, Clone, Default)]
pub struct LinExpr {
    terms: Vec<(VarId, f64)>,
}

impl LinExpr {
    pub fn new() -> Self {
        LinExpr { terms: Vec::new() }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        LinExpr { terms: Vec::with_capacity(capacity) }
    }

    pub fn add_term(&mut self, var: VarId, coef: f64) -> &mut Self {
        self.terms.push((var, coef));
        self
    }

    /// Sum of the given variables with unit coefficients.
    pub fn sum_of<I: IntoIterator<Item = VarId>>(vars: I) -> Self {
        LinExpr { terms: vars.into_iter().map(|v| (v, 1.0)).collect() }
    }

    pub fn terms(&self) -> &[(VarId, f64)] {
        &self.terms
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Evaluate the expression under an assignment.
    pub fn value(&self, assignment: &Assignment) -> f64 {
        self.terms.iter().map(|&(v, c)| c * assignment.value(v)).sum()
    }
}

/// Constraint sense.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sense {
    Eq,
    Le,
    Ge,
}

/// A linear constraint `expr <sense> rhs`.
#[derive(Debug, Clone)]
pub struct Constraint {
    pub name: String,
    pub expr: LinExpr,
    pub sense: Sense,
    pub rhs: f64,
}

impl Constraint {
    pub fn new(name: impl Into<String>, expr: LinExpr, sense: Sense, rhs: f64) -> Self {
        Constraint { name: name.into(), expr, sense, rhs }
    }

    /// Whether the assignment satisfies this constraint within `tol`.
    pub fn satisfied_by(&self, assignment: &Assignment, tol: f64) -> bool {
        let lhs = self.expr.value(assignment);
        match self.sense {
            Sense::Eq => (lhs - self.rhs).abs() <= tol,
            Sense::Le => lhs <= self.rhs + tol,
            Sense::Ge => lhs >= self.rhs - tol,
        }
    }
}

/// Objective direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjSense {
    Minimize,
    Maximize,
}

/// A complete MILP model: base constraints plus the accumulated cut pool.
///
/// The model has a single owner (the iteration controller) and is mutated
/// only by cut injection between solves.
#[derive(Debug, Clone)]
pub struct Model {
    name: String,
    vars: Vec<VarDef>,
    constraints: Vec<Constraint>,
    cuts: CutPool,
    obj_sense: ObjSense,
}

impl Model {
    pub fn new(name: impl Into<String>, obj_sense: ObjSense) -> Self {
        Model {
            name: name.into(),
            vars: Vec::new(),
            constraints: Vec::new(),
            cuts: CutPool::new(),
            obj_sense,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn obj_sense(&self) -> ObjSense {
        self.obj_sense
    }

    pub fn add_binary(&mut self, name: impl Into<String>, obj: f64) -> VarId {
        self.add_var(VarDef { name: name.into(), kind: VarKind::Binary, obj })
    }

    pub fn add_continuous(&mut self, name: impl Into<String>, lb: f64, ub: f64, obj: f64) -> VarId {
        self.add_var(VarDef { name: name.into(), kind: VarKind::Continuous { lb, ub }, obj })
    }

    fn add_var(&mut self, def: VarDef) -> VarId {
        let id = VarId(self.vars.len());
        self.vars.push(def);
        id
    }

    pub fn add_constraint(&mut self, constraint: Constraint) {
        self.constraints.push(constraint);
    }

    pub fn num_vars(&self) -> usize {
        self.vars.len()
    }

    pub fn vars(&self) -> &[VarDef] {
        &self.vars
    }

    /// Base constraints, without the cut pool.
    pub fn base_constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    pub fn cuts(&self) -> &CutPool {
        &self.cuts
    }

    /// All constraints the oracle must honor: base constraints followed by
    /// every accumulated cut.
    pub fn all_constraints(&self) -> impl Iterator<Item = &Constraint> {
        self.constraints.iter().chain(self.cuts.iter().map(Cut::as_constraint))
    }

    /// The CUTTING transition: append newly separated cuts to the pool.
    /// The pool only grows; the next solve sees the full accumulated model.
    pub fn inject_cuts(&mut self, cuts: Vec<Cut>) {
        self.cuts.extend(cuts);
    }

    /// Number of pool cuts the assignment violates. Used to check that a
    /// previously separated assignment is excluded by the updated model.
    pub fn violated_cut_count(&self, assignment: &Assignment, tol: f64) -> usize {
        self.cuts.iter().filter(|c| c.is_violated_by(assignment, tol)).count()
    }
}

/// Variable values returned by one oracle call, indexed by `VarId`.
///
/// Produced fresh on every solve; owned by the controller for the duration
/// of one separation pass.
#[derive(Debug, Clone)]
pub struct Assignment {
    values: Vec<f64>,
}

impl Assignment {
    pub fn from_values(values: Vec<f64>) -> Self {
        Assignment { values }
    }

    /// All-zero assignment over `n` variables. Test and incumbent seeding.
    pub fn zeros(n: usize) -> Self {
        Assignment { values: vec![0.0; n] }
    }

    #[inline]
    pub fn value(&self, var: VarId) -> f64 {
        self.values[var.index()]
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn set(&mut self, var: VarId, value: f64) {
        self.values[var.index()] = value;
    }
}
