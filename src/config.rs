use crate::error::{Error, Result};
use crate::scenario::OutputValues;
use crate::tree::{ScenarioTree, Tree};

/// Which states may have no output event.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq)]
pub enum EpsilonOutputEvents {
    /// The initial state has no output event; others are unconstrained.
    Start,
    /// Only the initial state has no output event.
    #[default]
    OnlyStart,
    /// Every state has an output event.
    None,
}

/// Constraint on the algorithm of the initial state.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq)]
pub enum StartStateAlgorithms {
    /// Keeps every output value.
    Nothing,
    /// Resets every output value to `0`.
    #[default]
    Zero,
    /// Unconstrained.
    Any,
}

/// Configuration of the encoders and of the search procedures.
///
/// Every symmetry breaker can be toggled independently. Defaults:
///
/// ```
/// # use fbsat::config::*;
/// let config = Config::default();
/// assert_eq!(config.epsilon_output_events, EpsilonOutputEvents::OnlyStart);
/// assert_eq!(config.start_state_algorithms, StartStateAlgorithms::Zero);
/// assert!(config.bfs_automaton && config.bfs_guard);
/// assert!(!config.forbid_or);
/// assert_eq!(config.max_cegis_loops, 100);
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    pub epsilon_output_events: EpsilonOutputEvents,
    pub start_state_algorithms: StartStateAlgorithms,
    /// Output values of the initial configuration; all zeros if `None`.
    pub initial_output_values: Option<OutputValues>,
    pub forbid_or: bool,
    /// Forbid transitions into the initial state from other states.
    pub forbid_transitions_to_first_state: bool,
    pub bfs_automaton: bool,
    pub bfs_guard: bool,
    /// Order the transitions of every state by input event.
    pub encode_transitions_order: bool,
    /// Children of AND/OR: terminals first, sibling terminals by input variable.
    pub encode_terminals_order: bool,
    /// Order the two terminal children of AND/OR nodes.
    pub encode_terminals_mini_order: bool,
    /// Declare the cardinality totalizers eagerly.
    pub encode_totalizer: bool,
    /// At most one transition may fire per state, input event and input.
    pub encode_disjunctive_transitions: bool,
    /// Active nodes require a transition to fire.
    pub encode_reverse_implication: bool,
    /// Bound cardinalities by assumptions instead of permanent clauses.
    pub use_assumptions: bool,
    /// Keep K of the initial automaton in `cegis_min`; use `K = C` otherwise.
    pub reuse_k: bool,
    /// Ceiling on outer CEGIS loops in `cegis_min`.
    pub max_cegis_loops: usize,
    /// Ceiling on counterexample iterations of a single CEGIS run.
    pub max_cegis_iterations: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            epsilon_output_events: EpsilonOutputEvents::default(),
            start_state_algorithms: StartStateAlgorithms::default(),
            initial_output_values: None,
            forbid_or: false,
            forbid_transitions_to_first_state: true,
            bfs_automaton: true,
            bfs_guard: true,
            encode_transitions_order: true,
            encode_terminals_order: false,
            encode_terminals_mini_order: false,
            encode_totalizer: true,
            encode_disjunctive_transitions: false,
            encode_reverse_implication: true,
            use_assumptions: true,
            reuse_k: true,
            max_cegis_loops: 100,
            max_cegis_iterations: 10000,
        }
    }
}

impl Config {
    /// Check the configuration against a scenario tree.
    pub fn validate(&self, tree: &ScenarioTree) -> Result<()> {
        if let Some(values) = &self.initial_output_values {
            let z = tree.alphabet().num_output_variables();
            if values.len() != z {
                return Err(Error::Config(format!(
                    "initial output values '{}' have width {}, but there are {} output variables",
                    values,
                    values.len(),
                    z
                )));
            }
            if values != tree.initial_output_values() {
                return Err(Error::Config(format!(
                    "initial output values '{}' differ from the tree root '{}'",
                    values,
                    tree.initial_output_values()
                )));
            }
        }
        if self.max_cegis_loops == 0 || self.max_cegis_iterations == 0 {
            return Err(Error::Config("CEGIS ceilings must be positive".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::scenario::Alphabet;

    #[test]
    fn test_validate() {
        let alphabet = Alphabet::new(["REQ"], ["CNF"], ["x"], ["a", "b"]);
        let tree = ScenarioTree::new(alphabet.clone(), None).unwrap();
        let mut config = Config::default();
        assert!(config.validate(&tree).is_ok());

        config.initial_output_values = Some(OutputValues::zeros(3));
        assert!(matches!(config.validate(&tree), Err(Error::Config(_))));

        config.initial_output_values = Some(OutputValues::parse("10").unwrap());
        assert!(matches!(config.validate(&tree), Err(Error::Config(_))));

        let tree = ScenarioTree::new(alphabet, config.initial_output_values.clone()).unwrap();
        assert!(config.validate(&tree).is_ok());
    }
}
