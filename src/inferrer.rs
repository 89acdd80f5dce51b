//! Inference driver: owns the solver and the declaration context, declares
//! tasks, solves and decodes automata, and runs bound-descent searches.

use std::fmt;
use std::time::Instant;

use log::{debug, error, info, warn};

use crate::automaton::Automaton;
use crate::card::{Bound, Cardinality};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::solver::{Backend, Model, Solver, VarisatBackend};
use crate::task::{BasicTask, CompleteTask, Context, ExtendedTask, Task, TaskKind};
use crate::tree::{NegativeScenarioTree, ScenarioTree, Tree};

/// Quantity minimized by a bound descent.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub(crate) enum Measure {
    /// T, the number of transitions.
    Transitions,
    /// N, the total size of guards.
    GuardsSize,
}

impl Measure {
    fn of(self, automaton: &Automaton) -> usize {
        match self {
            Measure::Transitions => automaton.number_of_transitions(),
            Measure::GuardsSize => automaton.total_guards_size(),
        }
    }
}

impl fmt::Display for Measure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Measure::Transitions => write!(f, "T"),
            Measure::GuardsSize => write!(f, "N"),
        }
    }
}

type BackendFactory = Box<dyn Fn() -> Box<dyn Backend>>;

pub struct Inferrer {
    pub(crate) config: Config,
    make_backend: BackendFactory,
    pub(crate) solver: Solver,
    pub(crate) context: Context,
}

impl Inferrer {
    pub fn new(config: Config) -> Self {
        Self::with_backend(config, || Box::new(VarisatBackend::new()))
    }

    pub fn with_backend<F>(config: Config, make_backend: F) -> Self
    where
        F: Fn() -> Box<dyn Backend> + 'static,
    {
        let solver = Solver::new(make_backend());
        Self {
            config,
            make_backend: Box::new(make_backend),
            solver,
            context: Context::default(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn solver(&self) -> &Solver {
        &self.solver
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    /// Start a new epoch: fresh solver, empty context.
    pub fn reset(&mut self) {
        debug!("Resetting the solver");
        self.solver = Solver::new((self.make_backend)());
        self.context = Context::default();
    }

    /// Declare a task into the current epoch. A task kind that is already
    /// declared is skipped with a warning.
    pub fn declare<T: Task>(&mut self, task: T) -> Result<()> {
        let kind = task.kind();
        if self.context.declared.contains(&kind) {
            warn!("Task '{}' is already declared, skipping", kind.name());
            return Ok(());
        }
        let time_start = Instant::now();
        task.declare(&mut self.solver, &mut self.context, &self.config)?;
        self.context.declared.insert(kind);
        debug!(
            "Declared {} task in {:.3} s: {} variables, {} clauses",
            kind.name(),
            time_start.elapsed().as_secs_f64(),
            self.solver.num_vars(),
            self.solver.num_clauses()
        );
        Ok(())
    }

    /// Solve under the assumptions collected from the context.
    pub fn solve(&mut self) -> Result<Option<Model>> {
        let assumptions = self.context.assumptions();
        let time_start = Instant::now();
        let model = self.solver.solve(&assumptions)?;
        info!(
            "{} in {:.3} s",
            if model.is_some() { "SAT" } else { "UNSAT" },
            time_start.elapsed().as_secs_f64()
        );
        Ok(model)
    }

    /// Solve and decode an automaton with truth-table guards.
    pub fn infer_basic(&mut self) -> Result<Option<Automaton>> {
        let Some(model) = self.solve()? else {
            return Ok(None);
        };
        let basic = self.context.basic.as_ref().ok_or(Error::TaskOrder {
            task: "infer_basic",
            requires: TaskKind::Basic.name(),
        })?;
        let automaton = basic.decode(&model);
        if !automaton.verify(&basic.scenario_tree) {
            error!("Inferred automaton does not reproduce the scenarios");
        }
        Ok(Some(automaton))
    }

    /// Solve and decode an automaton with parse-tree guards.
    ///
    /// If a complete task is declared, the negative mapping of the model is
    /// recorded in the heat map.
    pub fn infer_extended(&mut self) -> Result<Option<Automaton>> {
        let Some(model) = self.solve()? else {
            return Ok(None);
        };
        let (Some(basic), Some(extended)) = (&self.context.basic, &self.context.extended) else {
            return Err(Error::TaskOrder {
                task: "infer_extended",
                requires: TaskKind::Extended.name(),
            });
        };
        let automaton = extended.decode(basic, &model);
        if !automaton.verify(&basic.scenario_tree) {
            error!("Inferred automaton does not reproduce the scenarios");
        }
        if let Some(complete) = &self.context.complete {
            if !automaton.verify_negative(&complete.negative_tree) {
                error!("Inferred automaton exhibits a negative scenario");
            }
            for (i, state) in complete.decode_mapping(&model).into_iter().enumerate() {
                if state != 0 {
                    self.context.heat_map.entry(i + 1).or_default().insert(state);
                }
            }
        }
        Ok(Some(automaton))
    }

    pub fn infer_complete(&mut self) -> Result<Option<Automaton>> {
        if self.context.complete.is_none() {
            return Err(Error::TaskOrder {
                task: "infer_complete",
                requires: TaskKind::Complete.name(),
            });
        }
        self.infer_extended()
    }

    /// Decode with the richest task declared.
    fn infer_declared(&mut self) -> Result<Option<Automaton>> {
        if self.context.extended.is_some() {
            self.infer_extended()
        } else {
            self.infer_basic()
        }
    }

    /// Find an automaton with exactly `C` states.
    pub fn basic(
        &mut self,
        tree: &ScenarioTree,
        number_of_states: usize,
        max_outgoing_transitions: Option<usize>,
        max_transitions: Bound,
    ) -> Result<Option<Automaton>> {
        self.reset();
        let mut task = BasicTask::new(tree.clone(), number_of_states).with_max_transitions(max_transitions);
        if let Some(k) = max_outgoing_transitions {
            task = task.with_max_outgoing_transitions(k);
        }
        self.declare(task)?;
        self.infer_basic()
    }

    #[allow(clippy::too_many_arguments)]
    pub fn extended(
        &mut self,
        tree: &ScenarioTree,
        number_of_states: usize,
        max_outgoing_transitions: Option<usize>,
        max_guard_size: usize,
        max_transitions: Bound,
        max_total_guards_size: Bound,
    ) -> Result<Option<Automaton>> {
        self.reset();
        let mut task = BasicTask::new(tree.clone(), number_of_states).with_max_transitions(max_transitions);
        if let Some(k) = max_outgoing_transitions {
            task = task.with_max_outgoing_transitions(k);
        }
        self.declare(task)?;
        self.declare(ExtendedTask::new(max_guard_size).with_max_total_guards_size(max_total_guards_size))?;
        self.infer_extended()
    }

    /// Find an automaton that additionally exhibits none of the negative
    /// scenarios.
    #[allow(clippy::too_many_arguments)]
    pub fn complete(
        &mut self,
        tree: &ScenarioTree,
        negative_tree: Option<NegativeScenarioTree>,
        number_of_states: usize,
        max_outgoing_transitions: Option<usize>,
        max_guard_size: usize,
        max_transitions: Bound,
        max_total_guards_size: Bound,
    ) -> Result<Option<Automaton>> {
        self.reset();
        let mut task = BasicTask::new(tree.clone(), number_of_states).with_max_transitions(max_transitions);
        if let Some(k) = max_outgoing_transitions {
            task = task.with_max_outgoing_transitions(k);
        }
        self.declare(task)?;
        self.declare(ExtendedTask::new(max_guard_size).with_max_total_guards_size(max_total_guards_size))?;
        self.declare(CompleteTask::new(negative_tree))?;
        self.infer_complete()
    }

    /// Upper limit on the number of states tried by the minimal searches. A
    /// tree-shaped automaton with one state per active node always exists.
    fn max_number_of_states(tree: &ScenarioTree) -> usize {
        tree.active_vertices().len() + 1
    }

    /// Find the minimal number of states, then minimize the number of
    /// transitions for it.
    pub fn basic_min(&mut self, tree: &ScenarioTree) -> Result<Option<Automaton>> {
        for c in 1..=Self::max_number_of_states(tree) {
            info!("Trying C = {}", c);
            if let Some(automaton) = self.basic(tree, c, None, Bound::Unbounded)? {
                info!("Found minimal C = {}", c);
                let t = automaton.number_of_transitions();
                return Ok(self.optimize_t(0, Bound::AtMost(t))?.or(Some(automaton)));
            }
        }
        Ok(None)
    }

    /// Find an automaton with parse-tree guards of at most `P` nodes and
    /// minimize N. With `number_of_states: None`, the minimal C is searched
    /// first.
    pub fn extended_min(
        &mut self,
        tree: &ScenarioTree,
        number_of_states: Option<usize>,
        max_guard_size: usize,
    ) -> Result<Option<Automaton>> {
        let states: Vec<usize> = match number_of_states {
            Some(c) => vec![c],
            None => (1..=Self::max_number_of_states(tree)).collect(),
        };
        for c in states {
            info!("Trying C = {}, P = {}", c, max_guard_size);
            if let Some(automaton) = self.extended(tree, c, None, max_guard_size, Bound::Unbounded, Bound::Unbounded)? {
                info!("Found automaton with C = {}", c);
                let n = automaton.total_guards_size();
                return Ok(self.optimize_n(0, Bound::AtMost(n))?.or(Some(automaton)));
            }
        }
        Ok(None)
    }

    /// Descend on T from `end` towards `start`, returning the last automaton
    /// found.
    pub fn optimize_t(&mut self, start: usize, end: Bound) -> Result<Option<Automaton>> {
        self.optimize(Measure::Transitions, start, end)
    }

    /// Descend on N from `end` towards `start`, returning the last automaton
    /// found. With assumptions, the bound of that automaton stays assumed.
    pub fn optimize_n(&mut self, start: usize, end: Bound) -> Result<Option<Automaton>> {
        self.optimize(Measure::GuardsSize, start, end)
    }

    fn optimize(&mut self, measure: Measure, start: usize, end: Bound) -> Result<Option<Automaton>> {
        info!("Optimizing {} from {} down to {}", measure, end, start);
        let mut bound = end;
        let mut best = None;
        loop {
            self.set_bound(measure, bound)?;
            let Some(automaton) = self.infer_declared()? else {
                info!("UNSAT for {} <= {}", measure, bound);
                break;
            };
            let value = measure.of(&automaton);
            info!("Found automaton with {} = {}", measure, value);
            best = Some(automaton);
            if value <= start {
                break;
            }
            bound = Bound::AtMost(value - 1);
        }
        // Keep assuming the best bound found.
        if self.config.use_assumptions {
            if let Some(automaton) = &best {
                self.set_bound(measure, Bound::AtMost(measure.of(automaton)))?;
            }
        }
        Ok(best)
    }

    /// Tighten (or, with assumptions, assume) the upper bound on T or N,
    /// declaring the totalizer on first use.
    pub(crate) fn set_bound(&mut self, measure: Measure, bound: Bound) -> Result<()> {
        let use_assumptions = self.config.use_assumptions;
        let card = match measure {
            Measure::Transitions => {
                if self.context.cardinality_t.is_none() {
                    let basic = self.context.basic.as_ref().ok_or(Error::TaskOrder {
                        task: "optimize_t",
                        requires: TaskKind::Basic.name(),
                    })?;
                    let card = Cardinality::new(&mut self.solver, basic.non_null_transitions());
                    self.context.cardinality_t = Some(card);
                }
                self.context.cardinality_t.as_mut()
            }
            Measure::GuardsSize => {
                if self.context.cardinality_n.is_none() {
                    let extended = self.context.extended.as_ref().ok_or(Error::TaskOrder {
                        task: "optimize_n",
                        requires: TaskKind::Extended.name(),
                    })?;
                    let card = Cardinality::new(&mut self.solver, extended.used_nodes());
                    self.context.cardinality_n = Some(card);
                }
                self.context.cardinality_n.as_mut()
            }
        };
        match card {
            Some(card) => card.set_upper_bound(&mut self.solver, bound, use_assumptions),
            None => Ok(()),
        }
    }
}
