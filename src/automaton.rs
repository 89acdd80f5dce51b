use std::fmt;

use log::debug;

use crate::guard::Guard;
use crate::scenario::{Alphabet, InputAction, InputEvent, OutputAction, OutputEvent, OutputValues};
use crate::tree::{NegativeScenarioTree, ScenarioTree};
use crate::utils::format_bits;

/// Per-state output algorithm.
///
/// On entering the state, output variable `z` becomes `top[z]` if it was
/// `true` and `bot[z]` if it was `false`.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Algorithm {
    top: Vec<bool>,
    bot: Vec<bool>,
}

impl Algorithm {
    pub fn new(top: Vec<bool>, bot: Vec<bool>) -> Self {
        assert_eq!(top.len(), bot.len(), "Algorithm halves must have the same width");
        Self { top, bot }
    }

    /// Algorithm that resets every output variable to `0`.
    pub fn zero(width: usize) -> Self {
        Self::new(vec![false; width], vec![false; width])
    }

    pub fn top(&self) -> &[bool] {
        &self.top
    }

    pub fn bot(&self) -> &[bool] {
        &self.bot
    }

    pub fn eval(&self, values: &OutputValues) -> OutputValues {
        let new = values
            .values()
            .iter()
            .enumerate()
            .map(|(z, &old)| if old { self.top[z] } else { self.bot[z] })
            .collect();
        OutputValues::new(new)
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", format_bits(&self.bot), format_bits(&self.top))
    }
}

#[derive(Debug, Clone)]
pub struct Transition {
    pub destination: usize,
    pub input_event: InputEvent,
    pub guard: Guard,
}

#[derive(Debug, Clone)]
pub struct State {
    pub id: usize,
    pub output_event: Option<OutputEvent>,
    pub algorithm: Algorithm,
    /// Outgoing transitions in priority order.
    pub transitions: Vec<Transition>,
}

/// Result of a single evaluation step.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct EvalResult {
    pub destination: usize,
    pub output: OutputAction,
}

/// Finite-state controller with guarded transitions and per-state algorithms.
///
/// States are 1-indexed, state 1 is initial.
#[derive(Debug, Clone)]
pub struct Automaton {
    alphabet: Alphabet,
    initial_output_values: OutputValues,
    states: Vec<State>,
}

impl Automaton {
    pub fn new(alphabet: Alphabet, initial_output_values: OutputValues) -> Self {
        Self {
            alphabet,
            initial_output_values,
            states: Vec::new(),
        }
    }

    /// Add a state and return its id.
    pub fn add_state(&mut self, output_event: Option<OutputEvent>, algorithm: Algorithm) -> usize {
        let id = self.states.len() + 1;
        self.states.push(State {
            id,
            output_event,
            algorithm,
            transitions: Vec::new(),
        });
        id
    }

    /// Append a transition with the lowest priority among the source's
    /// transitions.
    pub fn add_transition(&mut self, source: usize, destination: usize, input_event: InputEvent, guard: Guard) {
        assert!(destination >= 1 && destination <= self.states.len(), "Bad destination {}", destination);
        self.state_mut(source).transitions.push(Transition {
            destination,
            input_event,
            guard,
        });
    }

    pub fn alphabet(&self) -> &Alphabet {
        &self.alphabet
    }

    pub fn initial_output_values(&self) -> &OutputValues {
        &self.initial_output_values
    }

    pub fn states(&self) -> &[State] {
        &self.states
    }

    pub fn state(&self, id: usize) -> &State {
        assert_ne!(id, 0, "State ids must be >= 1");
        &self.states[id - 1]
    }

    fn state_mut(&mut self, id: usize) -> &mut State {
        assert_ne!(id, 0, "State ids must be >= 1");
        &mut self.states[id - 1]
    }

    pub fn transitions(&self) -> impl Iterator<Item = (&State, &Transition)> {
        self.states.iter().flat_map(|s| s.transitions.iter().map(move |t| (s, t)))
    }

    pub fn number_of_states(&self) -> usize {
        self.states.len()
    }

    pub fn number_of_transitions(&self) -> usize {
        self.states.iter().map(|s| s.transitions.len()).sum()
    }

    pub fn total_guards_size(&self) -> usize {
        self.transitions().map(|(_, t)| t.guard.size()).sum()
    }

    pub fn max_outgoing_transitions(&self) -> usize {
        self.states.iter().map(|s| s.transitions.len()).max().unwrap_or(0)
    }

    pub fn max_guard_size(&self) -> usize {
        self.transitions().map(|(_, t)| t.guard.size()).max().unwrap_or(0)
    }

    /// Process one input action in the given state.
    ///
    /// The first transition (in priority order) with a matching input event
    /// and a true guard fires: the automaton moves to its destination, emits
    /// the destination's output event and applies the destination's
    /// algorithm. If nothing fires, the automaton stays, emits nothing and
    /// keeps the output values.
    pub fn step(&self, state: usize, values: &OutputValues, input: &InputAction) -> EvalResult {
        let fired = self
            .state(state)
            .transitions
            .iter()
            .find(|t| Some(t.input_event) == input.event && t.guard.eval(&input.values));
        match fired {
            Some(t) => {
                let destination = self.state(t.destination);
                EvalResult {
                    destination: t.destination,
                    output: OutputAction {
                        event: destination.output_event,
                        values: destination.algorithm.eval(values),
                    },
                }
            }
            None => EvalResult {
                destination: state,
                output: OutputAction {
                    event: None,
                    values: values.clone(),
                },
            },
        }
    }

    /// Run the automaton from its initial configuration.
    pub fn eval<'a, I>(&self, inputs: I) -> Vec<EvalResult>
    where
        I: IntoIterator<Item = &'a InputAction>,
    {
        let mut state = 1;
        let mut values = self.initial_output_values.clone();
        let mut results = Vec::new();
        for input in inputs {
            let result = self.step(state, &values, input);
            state = result.destination;
            values = result.output.values.clone();
            results.push(result);
        }
        results
    }

    /// Check that the automaton reproduces every positive scenario.
    pub fn verify(&self, tree: &ScenarioTree) -> bool {
        for (i, scenario) in tree.scenarios().iter().enumerate() {
            let results = self.eval(scenario.elements().iter().map(|e| &e.input));
            for (j, (element, result)) in scenario.elements().iter().zip(&results).enumerate() {
                if element.output != result.output {
                    debug!(
                        "Scenario {} failed at element {}: expected {:?}, got {:?}",
                        i + 1,
                        j + 1,
                        element.output,
                        result.output
                    );
                    return false;
                }
            }
        }
        true
    }

    /// Check that the automaton exhibits none of the negative scenarios.
    ///
    /// A negative scenario is exhibited if every output matches and, for a
    /// lasso, the automaton is back in the state it had at the loop position.
    pub fn verify_negative(&self, tree: &NegativeScenarioTree) -> bool {
        for (i, scenario) in tree.negative_scenarios().iter().enumerate() {
            let results = self.eval(scenario.elements().iter().map(|e| &e.input));
            let outputs_match = scenario
                .elements()
                .iter()
                .zip(&results)
                .all(|(element, result)| element.output == result.output);
            if !outputs_match {
                continue;
            }
            let exhibited = match scenario.loop_position() {
                None => true,
                Some(l) => {
                    let states: Vec<usize> = std::iter::once(1).chain(results.iter().map(|r| r.destination)).collect();
                    states[l - 1] == states[states.len() - 1]
                }
            };
            if exhibited {
                debug!("Negative scenario {} is satisfied by the automaton", i + 1);
                return false;
            }
        }
        true
    }
}

impl fmt::Display for Automaton {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Automaton: C = {}, T = {}, N = {}",
            self.number_of_states(),
            self.number_of_transitions(),
            self.total_guards_size()
        )?;
        for state in &self.states {
            let event = match state.output_event {
                Some(o) => self.alphabet.output_event_name(o),
                None => "ε",
            };
            writeln!(f, "State {} ({}) {}", state.id, event, state.algorithm)?;
            for t in &state.transitions {
                writeln!(
                    f,
                    "  {} -> {} on {} if {}",
                    state.id,
                    t.destination,
                    self.alphabet.input_event_name(t.input_event),
                    t.guard.to_string_with(&self.alphabet.input_names)
                )?;
            }
        }
        Ok(())
    }
}
