//! Counterexample traces produced by the model checker.
//!
//! Traces are read from NuSMV `show_traces -v` output:
//!
//! ```text
//! Trace Description: LTL Counterexample
//! Trace Type: Counterexample
//!   -> State: 1.1 <-
//!     REQ = FALSE
//!     x = FALSE
//!   -- Loop starts here
//!   -> State: 1.2 <-
//!     REQ = TRUE
//! ```
//!
//! Variables that are not printed keep their previous value. Variables of an
//! `-> Input:` section belong to the state that follows it.

use std::collections::BTreeMap;
use std::path::Path;

use log::debug;

use crate::error::{Error, Result};
use crate::scenario::{
    Alphabet, InputAction, InputEvent, InputValues, NegativeScenario, OutputAction, OutputEvent, OutputValues,
    ScenarioElement,
};

/// Variable assignment of one trace state.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct TraceState {
    variables: BTreeMap<String, String>,
}

impl TraceState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            variables: pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.variables.insert(name.into(), value.into());
    }

    /// Value of the variable, matching `name` either exactly or as the last
    /// component of a qualified name such as `control.REQ`.
    pub fn get(&self, name: &str) -> Option<&str> {
        if let Some(value) = self.variables.get(name) {
            return Some(value);
        }
        self.variables
            .iter()
            .find(|(key, _)| key.rsplit('.').next() == Some(name))
            .map(|(_, value)| value.as_str())
    }

    fn get_bool(&self, name: &str) -> Result<bool> {
        match self.get(name) {
            Some("TRUE") => Ok(true),
            Some("FALSE") => Ok(false),
            Some(other) => Err(Error::MalformedScenario(format!(
                "variable '{}' has non-boolean value '{}'",
                name, other
            ))),
            None => Err(Error::MalformedScenario(format!("variable '{}' is missing", name))),
        }
    }

    /// The single event among `names` that is `TRUE`, as a 1-based index.
    fn active_event(&self, names: &[String]) -> Result<Option<usize>> {
        let mut active = None;
        for (i, name) in names.iter().enumerate() {
            if self.get(name) == Some("TRUE") {
                if let Some(j) = active {
                    return Err(Error::MalformedScenario(format!(
                        "events '{}' and '{}' are both active",
                        names[j - 1],
                        name
                    )));
                }
                active = Some(i + 1);
            }
        }
        Ok(active)
    }
}

/// A model-checker trace: a sequence of states, optionally a lasso.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct Counterexample {
    pub states: Vec<TraceState>,
    /// 1-based index of the state where the loop starts.
    pub loop_position: Option<usize>,
}

impl Counterexample {
    pub fn new(states: Vec<TraceState>, loop_position: Option<usize>) -> Self {
        Self { states, loop_position }
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Vec<Self>> {
        let text = std::fs::read_to_string(path)?;
        Self::parse_all(&text)
    }

    /// Parse every trace in the text.
    pub fn parse_all(text: &str) -> Result<Vec<Self>> {
        let mut traces = Vec::new();
        let mut current: Option<Counterexample> = None;
        let mut values = TraceState::new();
        let mut pending_input = TraceState::new();
        let mut pending_loop = false;
        let mut in_input = false;

        for (i, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.starts_with("Trace Description") {
                traces.extend(current.take());
                current = Some(Counterexample::default());
                values = TraceState::new();
                pending_input = TraceState::new();
                pending_loop = false;
                in_input = false;
                continue;
            }
            let Some(trace) = current.as_mut() else {
                continue;
            };
            if line == "-- Loop starts here" {
                pending_loop = true;
            } else if line.starts_with("-> State:") {
                values.variables.append(&mut pending_input.variables);
                trace.states.push(values.clone());
                if pending_loop {
                    trace.loop_position = Some(trace.states.len());
                    pending_loop = false;
                }
                in_input = false;
            } else if line.starts_with("-> Input:") {
                in_input = true;
            } else if line.starts_with("--") {
                continue;
            } else if let Some((name, value)) = line.split_once(" = ") {
                let (name, value) = (name.trim(), value.trim());
                if in_input {
                    pending_input.set(name, value);
                } else if let Some(state) = trace.states.last_mut() {
                    state.set(name, value);
                    values.set(name, value);
                } else {
                    return Err(Error::Parse {
                        line: i + 1,
                        message: format!("assignment '{}' outside of a state", line),
                    });
                }
            }
        }
        traces.extend(current);
        debug!("Parsed {} counterexample(s)", traces.len());
        Ok(traces)
    }

    /// Convert to a negative scenario over the alphabet.
    ///
    /// The first state is the initial configuration and corresponds to the
    /// tree root, so every following state becomes one scenario element.
    pub fn to_negative_scenario(&self, alphabet: &Alphabet) -> Result<NegativeScenario> {
        let mut elements = Vec::with_capacity(self.states.len().saturating_sub(1));
        for state in self.states.iter().skip(1) {
            let input_event = state.active_event(&alphabet.input_events)?.map(InputEvent::new);
            let output_event = state.active_event(&alphabet.output_events)?.map(OutputEvent::new);
            let input_values = alphabet
                .input_names
                .iter()
                .map(|name| state.get_bool(name))
                .collect::<Result<Vec<bool>>>()?;
            let output_values = alphabet
                .output_names
                .iter()
                .map(|name| state.get_bool(name))
                .collect::<Result<Vec<bool>>>()?;
            elements.push(ScenarioElement::new(
                InputAction {
                    event: input_event,
                    values: InputValues::new(input_values),
                },
                OutputAction {
                    event: output_event,
                    values: OutputValues::new(output_values),
                },
            ));
        }
        NegativeScenario::new(elements, self.loop_position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use test_log::test;

    const TRACE: &str = "\
*** This is NuSMV 2.6.0
-- specification G (REQ -> F CNF)  is false
-- as demonstrated by the following execution sequence
Trace Description: LTL Counterexample
Trace Type: Counterexample
  -> State: 1.1 <-
    REQ = FALSE
    x = FALSE
    CNF = FALSE
    z = FALSE
  -> Input: 1.2 <-
    REQ = TRUE
  -- Loop starts here
  -> State: 1.2 <-
    x = TRUE
    CNF = TRUE
    z = TRUE
  -> State: 1.3 <-
    CNF = FALSE
";

    fn alphabet() -> Alphabet {
        Alphabet::new(["REQ"], ["CNF"], ["x"], ["z"])
    }

    #[test]
    fn test_parse_trace() {
        let traces = Counterexample::parse_all(TRACE).unwrap();
        assert_eq!(traces.len(), 1);
        let trace = &traces[0];
        assert_eq!(trace.states.len(), 3);
        assert_eq!(trace.loop_position, Some(2));
        assert_eq!(trace.states[1].get("REQ"), Some("TRUE"));
        // Carried forward from state 1.2.
        assert_eq!(trace.states[2].get("x"), Some("TRUE"));
        assert_eq!(trace.states[2].get("CNF"), Some("FALSE"));
    }

    #[test]
    fn test_to_negative_scenario() {
        let traces = Counterexample::parse_all(TRACE).unwrap();
        let scenario = traces[0].to_negative_scenario(&alphabet()).unwrap();
        println!("{:?}", scenario);
        assert_eq!(scenario.len(), 2);
        assert_eq!(scenario.loop_position(), Some(2));
        let first = &scenario.elements()[0];
        assert_eq!(first.input.event, Some(InputEvent::new(1)));
        assert_eq!(first.output.event, Some(OutputEvent::new(1)));
        assert_eq!(first.output.values.to_string(), "1");
        assert_eq!(scenario.elements()[1].output.event, None);
    }

    #[test]
    fn test_qualified_names() {
        let state = TraceState::from_pairs([("control.REQ", "TRUE")]);
        assert_eq!(state.get("REQ"), Some("TRUE"));
        assert_eq!(state.get("CNF"), None);
    }

    #[test]
    fn test_two_active_events() {
        let alphabet = Alphabet::new(["A", "B"], ["CNF"], ["x"], ["z"]);
        let init = TraceState::from_pairs([("x", "FALSE"), ("z", "FALSE")]);
        let state = TraceState::from_pairs([("A", "TRUE"), ("B", "TRUE"), ("x", "FALSE"), ("z", "FALSE")]);
        let trace = Counterexample::new(vec![init, state], None);
        assert!(trace.to_negative_scenario(&alphabet).is_err());
    }

    #[test]
    fn test_no_traces() {
        let traces = Counterexample::parse_all("-- specification G TRUE  is true\n").unwrap();
        assert!(traces.is_empty());
    }
}
