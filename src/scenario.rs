//! Scenarios: sequences of input/output actions.
//!
//! # Scenario files
//!
//! The first non-empty line holds the number of scenarios; every following
//! non-empty line is one scenario, a `;`-separated list of actions:
//!
//! ```text
//! 2
//! in=REQ[00]; out=CNF[1]; in=REQ[11]; out=CNF[0]
//! in=REQ[01]; in=REQ[10]; out=CNF[1]
//! ```
//!
//! Every `in=` action starts a new element. An `in=` action that is not
//! followed by an `out=` action is *passive*: no output event is produced and
//! the output values stay unchanged.

use std::fmt;

use itertools::Itertools;

use crate::error::{Error, Result};
use crate::utils::{format_bits, parse_bits, split_event_bits};

/// An input event, 1-indexed into [`Alphabet::input_events`].
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct InputEvent(usize);

impl InputEvent {
    /// # Panics
    ///
    /// Panics if `index == 0`.
    pub fn new(index: usize) -> Self {
        assert_ne!(index, 0, "Event indices must be >= 1");
        Self(index)
    }

    pub fn index(self) -> usize {
        self.0
    }
}

/// An output event, 1-indexed into [`Alphabet::output_events`].
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct OutputEvent(usize);

impl OutputEvent {
    /// # Panics
    ///
    /// Panics if `index == 0`.
    pub fn new(index: usize) -> Self {
        assert_ne!(index, 0, "Event indices must be >= 1");
        Self(index)
    }

    pub fn index(self) -> usize {
        self.0
    }
}

macro_rules! bool_vector {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
        pub struct $name(Vec<bool>);

        impl $name {
            pub fn new(values: Vec<bool>) -> Self {
                Self(values)
            }

            pub fn zeros(n: usize) -> Self {
                Self(vec![false; n])
            }

            pub fn len(&self) -> usize {
                self.0.len()
            }

            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }

            /// Value of the 1-indexed variable.
            pub fn get(&self, index: usize) -> bool {
                assert_ne!(index, 0, "Variable indices must be >= 1");
                self.0[index - 1]
            }

            pub fn values(&self) -> &[bool] {
                &self.0
            }

            pub fn parse(s: &str) -> Option<Self> {
                parse_bits(s).map(Self)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", format_bits(&self.0))
            }
        }
    };
}

bool_vector!(
    /// Values of the input variables.
    InputValues
);
bool_vector!(
    /// Values of the output variables.
    OutputValues
);

#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct InputAction {
    pub event: Option<InputEvent>,
    pub values: InputValues,
}

#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct OutputAction {
    pub event: Option<OutputEvent>,
    pub values: OutputValues,
}

#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct ScenarioElement {
    pub input: InputAction,
    pub output: OutputAction,
}

impl ScenarioElement {
    pub fn new(input: InputAction, output: OutputAction) -> Self {
        Self { input, output }
    }
}

/// Names of events and variables.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Alphabet {
    pub input_events: Vec<String>,
    pub output_events: Vec<String>,
    pub input_names: Vec<String>,
    pub output_names: Vec<String>,
}

impl Alphabet {
    pub fn new<S: Into<String>>(
        input_events: impl IntoIterator<Item = S>,
        output_events: impl IntoIterator<Item = S>,
        input_names: impl IntoIterator<Item = S>,
        output_names: impl IntoIterator<Item = S>,
    ) -> Self {
        Self {
            input_events: input_events.into_iter().map(Into::into).collect(),
            output_events: output_events.into_iter().map(Into::into).collect(),
            input_names: input_names.into_iter().map(Into::into).collect(),
            output_names: output_names.into_iter().map(Into::into).collect(),
        }
    }

    /// Number of input events (E).
    pub fn num_input_events(&self) -> usize {
        self.input_events.len()
    }

    /// Number of output events (O).
    pub fn num_output_events(&self) -> usize {
        self.output_events.len()
    }

    /// Number of input variables (X).
    pub fn num_input_variables(&self) -> usize {
        self.input_names.len()
    }

    /// Number of output variables (Z).
    pub fn num_output_variables(&self) -> usize {
        self.output_names.len()
    }

    pub fn input_event(&self, name: &str) -> Option<InputEvent> {
        self.input_events.iter().position(|e| e == name).map(|i| InputEvent::new(i + 1))
    }

    pub fn output_event(&self, name: &str) -> Option<OutputEvent> {
        self.output_events.iter().position(|e| e == name).map(|i| OutputEvent::new(i + 1))
    }

    pub fn input_event_name(&self, event: InputEvent) -> &str {
        &self.input_events[event.index() - 1]
    }

    pub fn output_event_name(&self, event: OutputEvent) -> &str {
        &self.output_events[event.index() - 1]
    }

    pub fn input_name(&self, x: usize) -> &str {
        &self.input_names[x - 1]
    }

    pub fn output_name(&self, z: usize) -> &str {
        &self.output_names[z - 1]
    }
}

/// A finite positive example trace.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct PositiveScenario {
    elements: Vec<ScenarioElement>,
}

impl PositiveScenario {
    pub fn new(elements: Vec<ScenarioElement>) -> Self {
        Self { elements }
    }

    pub fn elements(&self) -> &[ScenarioElement] {
        &self.elements
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Parse one scenario line against a known alphabet.
    pub fn parse(line: &str, alphabet: &Alphabet, initial_output_values: &OutputValues) -> Result<Self> {
        let raw = parse_raw_scenario(line, 0)?;
        resolve(raw, alphabet, initial_output_values)
    }
}

/// A trace the automaton must not exhibit.
///
/// `loop_position`, if present, is the 1-based index of the trace state where
/// the lasso loop starts, counting the initial state (the tree root) as 1.
/// The last element is then identified with that state.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct NegativeScenario {
    elements: Vec<ScenarioElement>,
    loop_position: Option<usize>,
}

impl NegativeScenario {
    pub fn new(elements: Vec<ScenarioElement>, loop_position: Option<usize>) -> Result<Self> {
        if let Some(l) = loop_position {
            if l == 0 || l > elements.len() + 1 {
                return Err(Error::MalformedScenario(format!(
                    "loop position {} is out of range 1..={}",
                    l,
                    elements.len() + 1
                )));
            }
        }
        Ok(Self {
            elements,
            loop_position,
        })
    }

    pub fn elements(&self) -> &[ScenarioElement] {
        &self.elements
    }

    pub fn loop_position(&self) -> Option<usize> {
        self.loop_position
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}

struct RawAction {
    event: String,
    bits: Vec<bool>,
}

struct RawElement {
    input: RawAction,
    output: Option<RawAction>,
}

fn parse_raw_scenario(line: &str, line_number: usize) -> Result<Vec<RawElement>> {
    let parse_error = |message: String| Error::Parse {
        line: line_number,
        message,
    };

    let mut elements: Vec<RawElement> = Vec::new();
    for token in line.split(';').map(str::trim).filter(|t| !t.is_empty()) {
        let (kind, action) = token
            .split_once('=')
            .ok_or_else(|| parse_error(format!("expected 'in=...' or 'out=...', got '{}'", token)))?;
        let (event, bits) =
            split_event_bits(action).ok_or_else(|| parse_error(format!("bad action '{}'", action)))?;
        let bits = parse_bits(bits).ok_or_else(|| parse_error(format!("bad bit-string in '{}'", action)))?;
        let action = RawAction {
            event: event.to_string(),
            bits,
        };
        match kind.trim() {
            "in" => elements.push(RawElement {
                input: action,
                output: None,
            }),
            "out" => match elements.last_mut() {
                Some(element) if element.output.is_none() => element.output = Some(action),
                _ => return Err(parse_error(format!("'{}' does not follow an input action", token))),
            },
            other => return Err(parse_error(format!("unknown action kind '{}'", other))),
        }
    }
    Ok(elements)
}

fn resolve(raw: Vec<RawElement>, alphabet: &Alphabet, initial_output_values: &OutputValues) -> Result<PositiveScenario> {
    let mut previous = initial_output_values.clone();
    let mut elements = Vec::with_capacity(raw.len());
    for element in raw {
        let input_event = alphabet.input_event(&element.input.event).ok_or_else(|| {
            Error::MalformedScenario(format!("unknown input event '{}'", element.input.event))
        })?;
        let input = InputAction {
            event: Some(input_event),
            values: InputValues::new(element.input.bits),
        };
        let output = match element.output {
            None => OutputAction {
                event: None,
                values: previous.clone(),
            },
            Some(action) => {
                let output_event = alphabet.output_event(&action.event).ok_or_else(|| {
                    Error::MalformedScenario(format!("unknown output event '{}'", action.event))
                })?;
                OutputAction {
                    event: Some(output_event),
                    values: OutputValues::new(action.bits),
                }
            }
        };
        previous = output.values.clone();
        elements.push(ScenarioElement { input, output });
    }
    Ok(PositiveScenario::new(elements))
}

/// Parse a scenario file.
///
/// Event names are collected in order of first appearance. When
/// `initial_output_values` is `None`, all output variables start at `0`.
pub fn read_scenarios(
    text: &str,
    input_names: Vec<String>,
    output_names: Vec<String>,
    initial_output_values: Option<&OutputValues>,
) -> Result<(Alphabet, Vec<PositiveScenario>)> {
    let mut lines = text.lines().enumerate().filter(|(_, line)| !line.trim().is_empty());

    let (count_line, count) = lines.next().ok_or_else(|| Error::Parse {
        line: 1,
        message: "missing number of scenarios".to_string(),
    })?;
    let count: usize = count.trim().parse().map_err(|e| Error::Parse {
        line: count_line + 1,
        message: format!("bad number of scenarios: {}", e),
    })?;

    let raw: Vec<Vec<RawElement>> = lines
        .map(|(i, line)| parse_raw_scenario(line, i + 1))
        .collect::<Result<_>>()?;
    if raw.len() != count {
        return Err(Error::Parse {
            line: count_line + 1,
            message: format!("expected {} scenarios, found {}", count, raw.len()),
        });
    }

    let input_events = raw.iter().flatten().map(|e| e.input.event.clone()).unique().collect_vec();
    let output_events = raw
        .iter()
        .flatten()
        .filter_map(|e| e.output.as_ref().map(|o| o.event.clone()))
        .unique()
        .collect_vec();
    let alphabet = Alphabet {
        input_events,
        output_events,
        input_names,
        output_names,
    };

    let initial = match initial_output_values {
        Some(values) => values.clone(),
        None => OutputValues::zeros(alphabet.num_output_variables()),
    };
    let scenarios = raw
        .into_iter()
        .map(|elements| resolve(elements, &alphabet, &initial))
        .collect::<Result<Vec<_>>>()?;
    Ok((alphabet, scenarios))
}

#[cfg(test)]
mod tests {
    use super::*;

    use test_log::test;

    fn names(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_read_scenarios() {
        let text = "2\nin=REQ[00]; out=CNF[1]; in=REQ[11]; out=CNF[0]\n\nin=REQ[01]; in=REQ[10]; out=CNF[1]\n";
        let (alphabet, scenarios) = read_scenarios(text, names(&["x1", "x2"]), names(&["z1"]), None).unwrap();
        assert_eq!(alphabet.input_events, vec!["REQ"]);
        assert_eq!(alphabet.output_events, vec!["CNF"]);
        assert_eq!(scenarios.len(), 2);
        assert_eq!(scenarios[0].len(), 2);
        assert_eq!(scenarios[1].len(), 2);

        let passive = &scenarios[1].elements()[0];
        println!("passive element: {:?}", passive);
        assert_eq!(passive.output.event, None);
        assert_eq!(passive.output.values, OutputValues::zeros(1));

        let active = &scenarios[1].elements()[1];
        assert_eq!(active.input.values.to_string(), "10");
        assert_eq!(active.output.event, alphabet.output_event("CNF"));
        assert!(active.output.values.get(1));
    }

    #[test]
    fn test_passive_keeps_previous_values() {
        let alphabet = Alphabet::new(["REQ"], ["CNF"], ["x"], ["a", "b"]);
        let initial = OutputValues::zeros(2);
        let scenario = PositiveScenario::parse("in=REQ[1]; out=CNF[10]; in=REQ[0]", &alphabet, &initial).unwrap();
        assert_eq!(scenario.elements()[1].output.values.to_string(), "10");
    }

    #[test]
    fn test_count_mismatch() {
        let text = "3\nin=REQ[0]\nin=REQ[1]\n";
        let result = read_scenarios(text, names(&["x"]), names(&[]), None);
        assert!(matches!(result, Err(Error::Parse { line: 1, .. })));
    }

    #[test]
    fn test_bad_tokens() {
        let alphabet = Alphabet::new(["REQ"], ["CNF"], ["x"], ["z"]);
        let initial = OutputValues::zeros(1);
        for line in ["out=CNF[1]", "in=REQ[2]", "in=REQ", "foo=REQ[1]", "in=REQ[1]; out=CNF[1]; out=CNF[0]"] {
            let result = PositiveScenario::parse(line, &alphabet, &initial);
            println!("{} -> {:?}", line, result);
            assert!(matches!(result, Err(Error::Parse { .. })));
        }
        let result = PositiveScenario::parse("in=FOO[1]", &alphabet, &initial);
        assert!(matches!(result, Err(Error::MalformedScenario(_))));
    }

    #[test]
    fn test_negative_loop_position_range() {
        assert!(NegativeScenario::new(vec![], Some(1)).is_ok());
        assert!(NegativeScenario::new(vec![], Some(2)).is_err());
        assert!(NegativeScenario::new(vec![], Some(0)).is_err());
        assert!(NegativeScenario::new(vec![], None).is_ok());
    }
}
