use std::collections::BTreeSet;

use log::{debug, info};

use crate::config::Config;
use crate::constraints::mapping::declare_negative_mapping_constraints;
use crate::domain::DomainVar;
use crate::error::{Error, Result};
use crate::solver::{Model, Solver};
use crate::task::{Context, Task, TaskKind};
use crate::tree::{NegativeScenarioTree, Tree};

/// Negative mapping of counterexamples.
///
/// With `negative_tree: None`, an empty negative tree is created from the
/// positive one.
#[derive(Debug, Clone, Default)]
pub struct CompleteTask {
    pub negative_tree: Option<NegativeScenarioTree>,
}

impl CompleteTask {
    pub fn new(negative_tree: Option<NegativeScenarioTree>) -> Self {
        Self { negative_tree }
    }
}

impl Task for CompleteTask {
    fn kind(&self) -> TaskKind {
        TaskKind::Complete
    }

    fn declare(self, solver: &mut Solver, context: &mut Context, config: &Config) -> Result<()> {
        let basic = context.basic.as_ref().ok_or(Error::TaskOrder {
            task: TaskKind::Complete.name(),
            requires: TaskKind::Basic.name(),
        })?;
        if context.extended.is_none() {
            return Err(Error::TaskOrder {
                task: TaskKind::Complete.name(),
                requires: TaskKind::Extended.name(),
            });
        }
        let negative_tree = match self.negative_tree {
            Some(tree) => tree,
            None => NegativeScenarioTree::from_positive(&basic.scenario_tree),
        };
        let positive_inputs = basic.scenario_tree.unique_inputs();
        if !negative_tree.unique_inputs().starts_with(positive_inputs) {
            return Err(Error::Config(
                "negative tree was not created from the positive scenario tree".to_string(),
            ));
        }
        info!("Declaring complete task: negative tree of size {}", negative_tree.size());

        // The root always maps to the initial state.
        let root = DomainVar::new(solver, [1]);
        context.complete = Some(CompleteVariables {
            negative_tree,
            neg_mapping: vec![root],
            declared_loop_backs: BTreeSet::new(),
            declared_rejecting: BTreeSet::new(),
        });
        update_negative_reduction(solver, context, config)
    }
}

#[derive(Debug, Clone)]
pub struct CompleteVariables {
    pub negative_tree: NegativeScenarioTree,
    /// `negMapping[v]` at index `v - 1`, over `0..=C` (`0`: diverged).
    pub neg_mapping: Vec<DomainVar<usize>>,
    pub(crate) declared_loop_backs: BTreeSet<(usize, usize)>,
    pub(crate) declared_rejecting: BTreeSet<usize>,
}

impl CompleteVariables {
    pub fn neg_mapping(&self, v: usize) -> &DomainVar<usize> {
        assert_ne!(v, 0, "Node ids must be >= 1");
        &self.neg_mapping[v - 1]
    }

    /// Number of negative nodes whose constraints are declared.
    pub fn declared_size(&self) -> usize {
        self.neg_mapping.len()
    }

    pub fn decode_mapping(&self, model: &Model) -> Vec<usize> {
        self.neg_mapping.iter().map(|m| m.decode(model)).collect()
    }
}

/// Declare variables and constraints for the part of the negative tree that
/// grew since the previous call: new input columns, new nodes, new
/// loop-backs.
pub fn update_negative_reduction(solver: &mut Solver, context: &mut Context, config: &Config) -> Result<()> {
    let (Some(basic), Some(extended), Some(complete)) =
        (context.basic.as_mut(), context.extended.as_mut(), context.complete.as_mut())
    else {
        return Err(Error::TaskOrder {
            task: TaskKind::Complete.name(),
            requires: TaskKind::Complete.name(),
        });
    };

    let inputs = complete.negative_tree.unique_inputs();
    if inputs.len() > basic.num_columns() {
        let new_inputs = inputs[basic.num_columns()..].to_vec();
        debug!("Adding {} input columns for counterexample inputs", new_inputs.len());
        for values in new_inputs {
            basic.push_column(solver, values, config);
            extended.push_column(solver, basic, basic.num_columns());
        }
    }

    let from = complete.declared_size() + 1;
    let size = complete.negative_tree.size();
    for _ in from..=size {
        complete.neg_mapping.push(DomainVar::new(solver, 0..=basic.num_states));
    }
    declare_negative_mapping_constraints(solver, basic, complete, from);
    Ok(())
}
