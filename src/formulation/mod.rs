//! Base model builders for the two supported formulations.
//!
//! Each submodule declares the decision variables and the base
//! (degree/visit/capacity) constraints of its integer program and wires
//! up the matching separator. The structural constraints — connectivity
//! for Steiner, subtour elimination for routing — are deliberately absent
//! from the base model: the cutting-plane loop supplies them lazily.

pub mod steiner;
pub mod vrp;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Which formulation a run uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
pub enum FormulationKind {
    /// Steiner tree with lazy connectivity cuts.
    SteinerCuts,
    /// Vehicle routing with lazy subtour elimination.
    VrpCuts,
}

impl FormulationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FormulationKind::SteinerCuts => "steiner-cuts",
            FormulationKind::VrpCuts => "vrp-cuts",
        }
    }
}
