//! Tasks declare variables and constraints into a [`Context`].
//!
//! A [`BasicTask`] encodes the automaton structure and the positive mapping,
//! an [`ExtendedTask`] adds parse-tree guards on top of it, and a
//! [`CompleteTask`] adds the negative mapping of counterexamples.

use std::collections::{BTreeMap, BTreeSet};

use crate::card::Cardinality;
use crate::config::Config;
use crate::error::Result;
use crate::lit::Lit;
use crate::solver::Solver;

mod basic;
mod complete;
mod extended;

pub use basic::{BasicTask, BasicVariables, InputColumn};
pub use complete::{update_negative_reduction, CompleteTask, CompleteVariables};
pub use extended::{ExtendedTask, ExtendedVariables};

#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum TaskKind {
    Basic,
    Extended,
    Complete,
}

impl TaskKind {
    pub fn name(self) -> &'static str {
        match self {
            TaskKind::Basic => "basic",
            TaskKind::Extended => "extended",
            TaskKind::Complete => "complete",
        }
    }
}

pub trait Task {
    fn kind(&self) -> TaskKind;

    fn declare(self, solver: &mut Solver, context: &mut Context, config: &Config) -> Result<()>;
}

/// Everything declared in the solver during one epoch.
#[derive(Default)]
pub struct Context {
    pub declared: BTreeSet<TaskKind>,
    pub basic: Option<BasicVariables>,
    pub extended: Option<ExtendedVariables>,
    pub complete: Option<CompleteVariables>,
    /// Totalizer over non-null transitions.
    pub cardinality_t: Option<Cardinality>,
    /// Totalizer over used guard nodes.
    pub cardinality_n: Option<Cardinality>,
    /// Negative node currently assumed to be unmapped (`negMapping = 0`).
    pub null_vertex: Option<usize>,
    pub null_vertex_observer: bool,
    pub need_regenerate_null_vertex: bool,
    pub can_map_tree_to_zero: bool,
    pub do_not_use_vertices: BTreeSet<usize>,
    /// Automaton states seen at every negative node across iterations.
    pub heat_map: BTreeMap<usize, BTreeSet<usize>>,
}

impl Context {
    /// Assumption literals for the next solve call.
    pub fn assumptions(&self) -> Vec<Lit> {
        let mut assumptions = Vec::new();
        if let Some(card) = &self.cardinality_t {
            assumptions.extend(card.assumptions());
        }
        if let Some(card) = &self.cardinality_n {
            assumptions.extend(card.assumptions());
        }
        if self.null_vertex_observer && self.can_map_tree_to_zero {
            if let (Some(v), Some(complete)) = (self.null_vertex, &self.complete) {
                if v <= complete.neg_mapping.len() {
                    assumptions.push(complete.neg_mapping(v).eq(0));
                }
            }
        }
        assumptions
    }
}
