use log::info;

use crate::automaton::Automaton;
use crate::card::{Bound, Cardinality};
use crate::config::Config;
use crate::constraints::guard::{declare_guard_column_constraints, declare_guard_constraints};
use crate::domain::DomainVar;
use crate::error::{Error, Result};
use crate::guard::{Guard, GuardNode, NodeType, ParseTreeGuard};
use crate::lit::Lit;
use crate::multiarray::MultiArray;
use crate::solver::{Model, Solver};
use crate::task::{BasicVariables, Context, Task, TaskKind};

/// Parse-tree guards of at most `P` nodes per transition.
#[derive(Debug, Clone)]
pub struct ExtendedTask {
    /// P
    pub max_guard_size: usize,
    /// N
    pub max_total_guards_size: Bound,
}

impl ExtendedTask {
    pub fn new(max_guard_size: usize) -> Self {
        Self {
            max_guard_size,
            max_total_guards_size: Bound::Unbounded,
        }
    }

    pub fn with_max_total_guards_size(mut self, n: Bound) -> Self {
        self.max_total_guards_size = n;
        self
    }
}

impl Task for ExtendedTask {
    fn kind(&self) -> TaskKind {
        TaskKind::Extended
    }

    fn declare(self, solver: &mut Solver, context: &mut Context, config: &Config) -> Result<()> {
        let basic = context.basic.as_ref().ok_or(Error::TaskOrder {
            task: TaskKind::Extended.name(),
            requires: TaskKind::Basic.name(),
        })?;
        assert!(self.max_guard_size >= 1, "Guards must have at least one node");
        info!(
            "Declaring extended task: P = {}, N = {}",
            self.max_guard_size, self.max_total_guards_size
        );

        let mut vars = ExtendedVariables::new(solver, basic, self.max_guard_size);
        declare_guard_constraints(solver, basic, &vars, config);
        for u in 1..=basic.num_columns() {
            vars.push_column(solver, basic, u);
        }

        if config.encode_totalizer || self.max_total_guards_size != Bound::Unbounded {
            let mut card = Cardinality::new(solver, vars.used_nodes());
            card.set_upper_bound(solver, self.max_total_guards_size, config.use_assumptions)?;
            context.cardinality_n = Some(card);
        }
        context.extended = Some(vars);
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct ExtendedVariables {
    /// P
    pub max_guard_size: usize,
    /// `[C, K, P]`
    pub node_type: MultiArray<DomainVar<NodeType>, 3>,
    /// `[C, K, P]` over `0..=X`
    pub node_input_variable: MultiArray<DomainVar<usize>, 3>,
    /// `[C, K, P]` over `0` and `1..p`
    pub node_parent: MultiArray<DomainVar<usize>, 3>,
    /// `[C, K, P]` over `0` and `p+1..=P`
    pub node_child: MultiArray<DomainVar<usize>, 3>,
    /// `[C, K, P]` per input number; node 1 is `transition_firing`.
    pub node_value: Vec<MultiArray<Lit, 3>>,
}

impl ExtendedVariables {
    fn new(solver: &mut Solver, basic: &BasicVariables, max_guard_size: usize) -> Self {
        let shape = [basic.num_states, basic.num_slots, max_guard_size];
        let num_inputs = basic.num_inputs;
        Self {
            max_guard_size,
            node_type: MultiArray::new_with(shape, |_| DomainVar::new(solver, NodeType::ALL)),
            node_input_variable: MultiArray::new_with(shape, |_| DomainVar::new(solver, 0..=num_inputs)),
            node_parent: MultiArray::new_with(shape, |[_, _, p]| {
                DomainVar::new(solver, std::iter::once(0).chain(1..p))
            }),
            node_child: MultiArray::new_with(shape, |[_, _, p]| {
                DomainVar::new(solver, std::iter::once(0).chain((p + 1)..=max_guard_size))
            }),
            node_value: Vec::new(),
        }
    }

    /// Allocate node values for input number `u` and declare their semantics.
    pub(crate) fn push_column(&mut self, solver: &mut Solver, basic: &BasicVariables, u: usize) {
        assert_eq!(u, self.node_value.len() + 1, "Guard columns must be added in order");
        let shape = [basic.num_states, basic.num_slots, self.max_guard_size];
        let values = MultiArray::new_with(shape, |[c, k, p]| {
            if p == 1 {
                basic.transition_firing(c, k, u)
            } else {
                solver.new_var()
            }
        });
        declare_guard_column_constraints(solver, basic, self, &values, u);
        self.node_value.push(values);
    }

    /// Literals "node is used".
    pub fn used_nodes(&self) -> Vec<Lit> {
        self.node_type.values().iter().map(|t| t.neq(NodeType::None)).collect()
    }

    pub fn decode_guard(&self, model: &Model, c: usize, k: usize) -> ParseTreeGuard {
        let mut nodes = Vec::new();
        for p in 1..=self.max_guard_size {
            let child = self.node_child[[c, k, p]].decode(model);
            let node = match self.node_type[[c, k, p]].decode(model) {
                NodeType::Terminal => GuardNode::Terminal(self.node_input_variable[[c, k, p]].decode(model)),
                NodeType::And => GuardNode::And(child, child + 1),
                NodeType::Or => GuardNode::Or(child, child + 1),
                NodeType::Not => GuardNode::Not(child),
                NodeType::None => break,
            };
            nodes.push(node);
        }
        ParseTreeGuard::new(nodes)
    }

    /// Decode the automaton with parse-tree guards.
    pub fn decode(&self, basic: &BasicVariables, model: &Model) -> Automaton {
        basic.decode_with(model, |c, k| Guard::ParseTree(self.decode_guard(model, c, k)))
    }
}
