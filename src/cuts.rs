//! Cuts and the append-only cut pool.
//!
//! A cut is an immutable linear inequality tagged with the structure that
//! produced it: the disconnected vertex subset for connectivity cuts, or
//! the (strongly connected component, vehicle) pair for subtour cuts.
//! Cuts are never removed. Structurally identical cuts rediscovered in a
//! later iteration are accepted as-is; the signature tag is kept so a
//! canonical deduplication could be layered on without touching the
//! separators.

use crate::model::{Assignment, Constraint, LinExpr, Sense};

/// Structure that produced a cut.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CutTag {
    /// Vertex component disconnected from the root but containing a
    /// terminal. Vertices are sorted.
    Connectivity { component: Vec<usize> },
    /// Strongly connected arc component excluding the depot, for one
    /// vehicle. Vertices are sorted.
    Subtour { component: Vec<usize>, vehicle: usize },
}

/// An inequality `expr >= rhs` over the decision variables.
///
/// Both cut families are normalized to `>=` form: connectivity cuts are
/// "at least one crossing edge", subtour cuts `y[h,k] <= outgoing` become
/// `outgoing - y[h,k] >= 0`.
#[derive(Debug, Clone)]
pub struct Cut {
    constraint: Constraint,
    tag: CutTag,
}

impl Cut {
    pub fn new(name: impl Into<String>, expr: LinExpr, rhs: f64, tag: CutTag) -> Self {
        Cut { constraint: Constraint::new(name, expr, Sense::Ge, rhs), tag }
    }

    pub fn as_constraint(&self) -> &Constraint {
        &self.constraint
    }

    pub fn tag(&self) -> &CutTag {
        &self.tag
    }

    /// Whether the assignment violates this cut.
    pub fn is_violated_by(&self, assignment: &Assignment, tol: f64) -> bool {
        !self.constraint.satisfied_by(assignment, tol)
    }
}

/// Append-only store of generated cuts, merged into the model before each
/// re-solve. The pool size is monotone non-decreasing across iterations.
#[derive(Debug, Clone, Default)]
pub struct CutPool {
    cuts: Vec<Cut>,
}

impl CutPool {
    pub fn new() -> Self {
        CutPool { cuts: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.cuts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cuts.is_empty()
    }

    pub fn push(&mut self, cut: Cut) {
        self.cuts.push(cut);
    }

    pub fn extend(&mut self, cuts: Vec<Cut>) {
        self.cuts.extend(cuts);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Cut> {
        self.cuts.iter()
    }
}
