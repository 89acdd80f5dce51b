use std::collections::BTreeMap;

use log::info;

use crate::automaton::{Algorithm, Automaton};
use crate::card::{Bound, Cardinality};
use crate::config::Config;
use crate::constraints::automaton::{declare_automaton_constraints, declare_column_constraints};
use crate::constraints::mapping::declare_positive_mapping_constraints;
use crate::domain::DomainVar;
use crate::error::Result;
use crate::guard::{Guard, TruthTableGuard};
use crate::lit::Lit;
use crate::multiarray::MultiArray;
use crate::scenario::{InputEvent, InputValues, OutputEvent};
use crate::solver::{Model, Solver};
use crate::task::{Context, Task, TaskKind};
use crate::tree::{ScenarioTree, Tree};

/// Automaton structure with truth-table guards, mapped onto a positive tree.
#[derive(Debug, Clone)]
pub struct BasicTask {
    pub scenario_tree: ScenarioTree,
    /// C
    pub number_of_states: usize,
    /// K, defaults to C
    pub max_outgoing_transitions: Option<usize>,
    /// T
    pub max_transitions: Bound,
}

impl BasicTask {
    pub fn new(scenario_tree: ScenarioTree, number_of_states: usize) -> Self {
        Self {
            scenario_tree,
            number_of_states,
            max_outgoing_transitions: None,
            max_transitions: Bound::Unbounded,
        }
    }

    pub fn with_max_outgoing_transitions(mut self, k: usize) -> Self {
        self.max_outgoing_transitions = Some(k);
        self
    }

    pub fn with_max_transitions(mut self, t: Bound) -> Self {
        self.max_transitions = t;
        self
    }
}

impl Task for BasicTask {
    fn kind(&self) -> TaskKind {
        TaskKind::Basic
    }

    fn declare(self, solver: &mut Solver, context: &mut Context, config: &Config) -> Result<()> {
        config.validate(&self.scenario_tree)?;
        let num_slots = self.max_outgoing_transitions.unwrap_or(self.number_of_states);
        assert!(self.number_of_states >= 1, "Automaton must have at least one state");
        assert!(num_slots >= 1, "Automaton must have at least one transition slot");
        info!(
            "Declaring basic task: C = {}, K = {}, T = {}",
            self.number_of_states, num_slots, self.max_transitions
        );

        let mut vars = BasicVariables::new(solver, self.scenario_tree, self.number_of_states, num_slots);
        declare_automaton_constraints(solver, &vars, config);
        let inputs = vars.scenario_tree.unique_inputs().to_vec();
        for values in inputs {
            vars.push_column(solver, values, config);
        }
        declare_positive_mapping_constraints(solver, &vars, config);

        if config.encode_totalizer || self.max_transitions != Bound::Unbounded {
            let mut card = Cardinality::new(solver, vars.non_null_transitions());
            card.set_upper_bound(solver, self.max_transitions, config.use_assumptions)?;
            context.cardinality_t = Some(card);
        }
        context.basic = Some(vars);
        Ok(())
    }
}

/// Variables depending on one input vector.
#[derive(Debug, Clone)]
pub struct InputColumn {
    pub values: InputValues,
    /// `[C, K]`
    pub transition_firing: MultiArray<Lit, 2>,
    /// `[C, E, K]`: slot k has input event e and fires.
    pub event_firing: MultiArray<Lit, 3>,
    /// `[C, E, K]`: slot k is the first firing slot with input event e.
    pub first_fired: MultiArray<Lit, 3>,
    /// `[C, E, K]`: no slot up to k fires with input event e.
    pub not_fired: MultiArray<Lit, 3>,
    /// `[C, E]` over `0..=C`, 0 = no transition.
    pub transition_function: MultiArray<DomainVar<usize>, 2>,
    /// `[C, E]` over `0..=O`, 0 = no output event.
    pub output_event_function: MultiArray<DomainVar<usize>, 2>,
    /// `[C, E, Z]`
    pub algorithm_function_top: MultiArray<Lit, 3>,
    /// `[C, E, Z]`
    pub algorithm_function_bot: MultiArray<Lit, 3>,
}

#[derive(Debug, Clone)]
pub struct BasicVariables {
    pub scenario_tree: ScenarioTree,
    /// C
    pub num_states: usize,
    /// K
    pub num_slots: usize,
    /// E
    pub num_input_events: usize,
    /// O
    pub num_output_events: usize,
    /// X
    pub num_inputs: usize,
    /// Z
    pub num_outputs: usize,
    /// `[C, K]` over `0..=C`
    pub transition_destination: MultiArray<DomainVar<usize>, 2>,
    /// `[C, K]` over `0..=E`
    pub transition_input_event: MultiArray<DomainVar<usize>, 2>,
    /// `[C]` over `0..=O`
    pub state_output_event: MultiArray<DomainVar<usize>, 1>,
    /// `[C, Z]`
    pub state_algorithm_top: MultiArray<Lit, 2>,
    /// `[C, Z]`
    pub state_algorithm_bot: MultiArray<Lit, 2>,
    /// Column `u - 1` belongs to input number `u`.
    pub columns: Vec<InputColumn>,
    /// `[V]` over `1..=C`
    pub mapping: MultiArray<DomainVar<usize>, 1>,
}

impl BasicVariables {
    fn new(solver: &mut Solver, scenario_tree: ScenarioTree, num_states: usize, num_slots: usize) -> Self {
        let alphabet = scenario_tree.alphabet();
        let num_input_events = alphabet.num_input_events();
        let num_output_events = alphabet.num_output_events();
        let num_inputs = alphabet.num_input_variables();
        let num_outputs = alphabet.num_output_variables();

        let transition_destination =
            MultiArray::new_with([num_states, num_slots], |_| DomainVar::new(solver, 0..=num_states));
        let transition_input_event =
            MultiArray::new_with([num_states, num_slots], |_| DomainVar::new(solver, 0..=num_input_events));
        let state_output_event = MultiArray::new_with([num_states], |_| DomainVar::new(solver, 0..=num_output_events));
        let state_algorithm_top = solver.new_array([num_states, num_outputs]);
        let state_algorithm_bot = solver.new_array([num_states, num_outputs]);
        let mapping = MultiArray::new_with([scenario_tree.size()], |_| DomainVar::new(solver, 1..=num_states));

        Self {
            scenario_tree,
            num_states,
            num_slots,
            num_input_events,
            num_output_events,
            num_inputs,
            num_outputs,
            transition_destination,
            transition_input_event,
            state_output_event,
            state_algorithm_top,
            state_algorithm_bot,
            columns: Vec::new(),
            mapping,
        }
    }

    /// Allocate the variables for the next input number and declare their
    /// structural constraints.
    pub(crate) fn push_column(&mut self, solver: &mut Solver, values: InputValues, config: &Config) {
        let (c, k, e, o, z) = (
            self.num_states,
            self.num_slots,
            self.num_input_events,
            self.num_output_events,
            self.num_outputs,
        );
        let column = InputColumn {
            values,
            transition_firing: solver.new_array([c, k]),
            event_firing: solver.new_array([c, e, k]),
            first_fired: solver.new_array([c, e, k]),
            not_fired: solver.new_array([c, e, k]),
            transition_function: MultiArray::new_with([c, e], |_| DomainVar::new(solver, 0..=c)),
            output_event_function: MultiArray::new_with([c, e], |_| DomainVar::new(solver, 0..=o)),
            algorithm_function_top: solver.new_array([c, e, z]),
            algorithm_function_bot: solver.new_array([c, e, z]),
        };
        declare_column_constraints(solver, self, &column, config);
        self.columns.push(column);
    }

    pub fn column(&self, u: usize) -> &InputColumn {
        assert_ne!(u, 0, "Input numbers must be >= 1");
        &self.columns[u - 1]
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn transition_firing(&self, c: usize, k: usize, u: usize) -> Lit {
        self.column(u).transition_firing[[c, k]]
    }

    pub fn transition_function(&self, c: usize, e: usize, u: usize) -> &DomainVar<usize> {
        &self.column(u).transition_function[[c, e]]
    }

    pub fn output_event_function(&self, c: usize, e: usize, u: usize) -> &DomainVar<usize> {
        &self.column(u).output_event_function[[c, e]]
    }

    /// Literals "slot (c, k) holds a transition".
    pub fn non_null_transitions(&self) -> Vec<Lit> {
        self.transition_destination.values().iter().map(|td| td.neq(0)).collect()
    }

    /// Decode the automaton with truth-table guards over the known inputs.
    pub fn decode(&self, model: &Model) -> Automaton {
        self.decode_with(model, |c, k| {
            let table: BTreeMap<InputValues, bool> = self
                .columns
                .iter()
                .map(|column| (column.values.clone(), model.value(column.transition_firing[[c, k]])))
                .collect();
            Guard::TruthTable(TruthTableGuard::new(table))
        })
    }

    pub(crate) fn decode_with<F>(&self, model: &Model, mut guard: F) -> Automaton
    where
        F: FnMut(usize, usize) -> Guard,
    {
        let tree = &self.scenario_tree;
        let mut automaton = Automaton::new(tree.alphabet().clone(), tree.initial_output_values().clone());
        for c in 1..=self.num_states {
            let output_event = match self.state_output_event[[c]].decode(model) {
                0 => None,
                o => Some(OutputEvent::new(o)),
            };
            let top = (1..=self.num_outputs).map(|z| model.value(self.state_algorithm_top[[c, z]])).collect();
            let bot = (1..=self.num_outputs).map(|z| model.value(self.state_algorithm_bot[[c, z]])).collect();
            automaton.add_state(output_event, Algorithm::new(top, bot));
        }
        for c in 1..=self.num_states {
            for k in 1..=self.num_slots {
                let destination = self.transition_destination[[c, k]].decode(model);
                if destination == 0 {
                    continue;
                }
                let input_event = InputEvent::new(self.transition_input_event[[c, k]].decode(model));
                automaton.add_transition(c, destination, input_event, guard(c, k));
            }
        }
        automaton
    }
}
